pub mod accelerometer;
pub mod graph;
pub mod signal;

use crate::config::{Config, SignalClip};
use crate::engine::compositor::Timeline;
use crate::engine::overlay::{Space, Stage};
use crate::engine::sampler::PartialCurve;
use crate::engine::segment::{Segment, SegmentBuilder};
use crate::engine::target::{Attribute, AttributeKind, ObjectId, Target, VisualTarget};
use crate::gfx::anim::{lerp, DriverId, Easing};
use crate::gfx::camera::Camera;
use crate::gfx::math::{Color, Vec3};
use crate::gfx::scene::Scene;
use anyhow::Result;
use graph::GraphPanel;
use signal::SignalGenerator;

/// A scripted piece of content that assembles its own reel.
pub trait Clip {
    fn name(&self) -> &'static str;
    fn build(&self, config: &Config) -> Result<Reel>;
}

/// Everything a clip produces: the scene, its overlay split and the timeline
/// that animates it.
#[derive(Debug)]
pub struct Reel {
    pub timeline: Timeline,
    pub scene: Scene,
    pub stage: Stage,
}

impl Reel {
    pub fn new(camera: Camera, background: Color) -> Self {
        Self {
            timeline: Timeline::new(),
            scene: Scene::new(camera),
            stage: Stage::new(background),
        }
    }

    pub fn driver(&mut self, name: &str) -> DriverId {
        self.timeline.add_driver(name, 0.0)
    }

    pub fn hide(&mut self, ids: &[ObjectId]) -> Result<()> {
        for id in ids {
            self.scene.set_opacity(*id, 0.0)?;
        }
        Ok(())
    }

    pub fn screen_label(&mut self, text: &str, size: f32, at: Vec3, color: Color) -> Result<ObjectId> {
        let id = self.scene.add_label(text, size, at, color);
        self.stage.anchor(&self.scene, id, Space::Screen)?;
        Ok(id)
    }

    /// One driver, one segment, any number of opacity ramps.
    pub fn fade_phase(&mut self, name: &str, seconds: f32, fades: &[(ObjectId, f32, f32)]) -> Result<()> {
        let d = self.driver(name);
        let mut seg = Segment::builder(name).duration(seconds).easing(Easing::Smooth).target(d, 1.0);
        for &(id, from, to) in fades {
            seg = fade(seg, d, id, from, to);
        }
        self.timeline.push(seg.build()?)?;
        Ok(())
    }

    /// Nothing moves for `seconds`.
    pub fn hold(&mut self, name: &str, seconds: f32) -> Result<()> {
        self.timeline.push(Segment::builder(name).duration(seconds).build()?)?;
        Ok(())
    }

    /// Generates one plotted line per channel of `clip`, each an empty
    /// screen-space polyline ready for a reveal binding.
    pub fn plot_lines(
        &mut self,
        clip: &SignalClip,
        panels: &[GraphPanel],
        max_points: usize,
        subdivisions: u32,
    ) -> Result<Vec<(ObjectId, PartialCurve)>> {
        let mut lines = Vec::with_capacity(panels.len());
        for (waveform, panel) in clip.channels.iter().zip(panels) {
            let series = waveform.generate(&clip.name, clip.samples, clip.window);
            let curve = PartialCurve::new(panel.plot(&series))
                .with_decimation(max_points)
                .with_smoothing(subdivisions);
            let id = self
                .scene
                .add_polyline(format!("{}.line", clip.name), Vec::new(), panel.color);
            if let Some(node) = self.scene.get_mut(id) {
                node.stroke_width = 2.0;
            }
            self.stage.anchor(&self.scene, id, Space::Screen)?;
            lines.push((id, curve));
        }
        Ok(lines)
    }
}

pub fn fade(seg: SegmentBuilder, driver: DriverId, id: ObjectId, from: f32, to: f32) -> SegmentBuilder {
    seg.bind(driver, Target::Object(id), AttributeKind::Opacity, move |v| {
        Attribute::Opacity(lerp(from, to, v))
    })
}

/// Grows a line along `curve` as the driver goes from 0 to 1.
pub fn reveal(seg: SegmentBuilder, driver: DriverId, id: ObjectId, curve: PartialCurve) -> SegmentBuilder {
    seg.bind(driver, Target::Object(id), AttributeKind::Points, move |v| {
        Attribute::Points(curve.display(v))
    })
}

pub fn tint(seg: SegmentBuilder, driver: DriverId, id: ObjectId, base: Color, peak: Color) -> SegmentBuilder {
    seg.bind(driver, Target::Object(id), AttributeKind::Color, move |v| {
        Attribute::Color(base.lerp(&peak, v))
    })
}

pub fn shift(seg: SegmentBuilder, driver: DriverId, id: ObjectId, from: Vec3, to: Vec3) -> SegmentBuilder {
    seg.bind(driver, Target::Object(id), AttributeKind::Position, move |v| {
        Attribute::Position(from.lerp(&to, v))
    })
}
