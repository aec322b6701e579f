//! The accelerometer explainer: a 30 second reel in five scenes and a five
//! second teaser.

use super::graph::GraphPanel;
use super::{fade, reveal, shift, tint, Clip, Reel};
use crate::config::{parse_color, Config, ReelSettings, Theme};
use crate::engine::overlay::Space;
use crate::engine::sampler::PartialCurve;
use crate::engine::segment::{DriverTarget, Segment};
use crate::engine::target::{Attribute, AttributeKind, ObjectId, Target, VisualTarget};
use crate::gfx::anim::{lerp, Easing};
use crate::gfx::math::{Color, Vec3};
use crate::gfx::scene::Scene;
use anyhow::Result;
use log::info;
use std::f32::consts::{PI, TAU};

const TITLE_AT: Vec3 = Vec3::new(0.0, 3.55, 0.0);
const CAPTION_AT: Vec3 = Vec3::new(0.0, 3.0, 0.0);
const FOOTER_AT: Vec3 = Vec3::new(0.0, -3.3, 0.0);
const LIFT: Vec3 = Vec3::new(0.0, 0.2, 0.0);

const WALK_FREQUENCY: f32 = 1.8;
const TILT: f32 = PI / 5.0;

struct Palette {
    title: Color,
    muted: Color,
    accent: Color,
    axis: Color,
    grid: Color,
    channels: [Color; 3],
}

impl Palette {
    fn new(theme: &Theme) -> Result<Self> {
        Ok(Self {
            title: parse_color(&theme.title)?,
            muted: parse_color(&theme.muted)?,
            accent: parse_color(&theme.accent)?,
            axis: parse_color(&theme.axis)?,
            grid: parse_color(&theme.grid)?,
            channels: [theme.channel(0)?, theme.channel(1)?, theme.channel(2)?],
        })
    }
}

/// Cube with three axis arrows and their letters, grouped around the origin
/// and moved to `home`.
struct Device {
    group: ObjectId,
    cube: ObjectId,
    axes: ObjectId,
    arrows: [ObjectId; 3],
    home: Vec3,
}

fn build_device(scene: &mut Scene, palette: &Palette, side: f32, axis_length: f32, home: Vec3) -> Result<Device> {
    let cube = scene.add_cuboid("cube", Vec3::new(side, side, side), Color::WHITE)?;
    scene.set_stroke_width(cube, 2.5)?;

    let dirs = [Vec3::RIGHT, Vec3::UP, Vec3::OUT];
    let mut arrows = [ObjectId(0); 3];
    let mut parts = Vec::with_capacity(6);
    for (i, (dir, name)) in dirs.iter().zip(["X", "Y", "Z"]).enumerate() {
        let color = palette.channels[i];
        arrows[i] = scene.add_arrow(format!("axis.{}", name), Vec3::ZERO, dir.scale(axis_length), color)?;
        parts.push(arrows[i]);
        parts.push(scene.add_label(name, 0.25, dir.scale(axis_length + 0.2), color));
    }
    let axes = scene.add_group("axes", &parts)?;
    let group = scene.add_group("device", &[cube, axes])?;
    if let Some(node) = scene.get_mut(group) {
        node.position = home;
    }
    Ok(Device {
        group,
        cube,
        axes,
        arrows,
        home,
    })
}

fn panels(palette: &Palette, centers: [Vec3; 3], y_range: (f32, f32), x_length: f32, y_length: f32) -> Vec<GraphPanel> {
    centers
        .iter()
        .enumerate()
        .map(|(i, center)| {
            let mut panel = GraphPanel::new(*center, (0.0, 5.0), y_range, x_length, y_length);
            panel.color = palette.channels[i];
            panel.axis_color = palette.axis;
            panel.grid_color = palette.grid;
            panel
        })
        .collect()
}

/// Small position offset of the device while walking.
fn bob(t: f32) -> Vec3 {
    let w = TAU * WALK_FREQUENCY * t;
    Vec3::new(0.08 * w.sin(), 0.05 * w.cos(), 0.03 * (2.0 * w).sin())
}

/// The full five-scene reel.
pub struct AccelerometerReel;

impl Clip for AccelerometerReel {
    fn name(&self) -> &'static str {
        "accelerometer"
    }

    fn build(&self, config: &Config) -> Result<Reel> {
        let settings: &ReelSettings = &config.full;
        let palette = Palette::new(&config.theme)?;
        let mut reel = Reel::new(settings.camera.camera(), parse_color(&settings.background)?);
        let max_points = config.max_display_points;
        let smoothing = config.smoothing_subdivisions;

        let title = reel.screen_label("Accelerometer", 0.5, TITLE_AT, palette.title)?;
        let device = build_device(&mut reel.scene, &palette, 1.5, 1.4, Vec3::new(-3.8, 0.0, 0.0))?;
        reel.stage.anchor(&reel.scene, device.group, Space::World)?;

        let mut graph = panels(
            &palette,
            [Vec3::new(3.6, 1.6, 0.0), Vec3::new(3.6, 0.0, 0.0), Vec3::new(3.6, -1.6, 0.0)],
            (-2.0, 2.0),
            4.5,
            1.0,
        );
        let mut panel_groups = Vec::new();
        for (panel, name) in graph.iter_mut().zip(["X", "Y", "Z"]) {
            panel.grid = vec![-1.0, 0.0, 1.0];
            panel.grid_labels = vec!["-1g".into(), "0".into(), "+1g".into()];
            panel.indicator = Some(name.into());
            panel_groups.push(panel.build(&mut reel.scene, &mut reel.stage)?.group);
        }

        let caption = |reel: &mut Reel, text: &str, hex: &str| -> Result<ObjectId> {
            let color = parse_color(hex)?;
            reel.screen_label(text, 0.3, CAPTION_AT, color)
        };
        let intro_text = reel.screen_label("Device at Rest", 0.3, CAPTION_AT, palette.muted)?;
        let tilt_text = caption(&mut reel, "Posture Change: Tilting", "#f59e0b")?;
        let walk_text = caption(&mut reel, "Walking: X/Y Oscillate", "#22c55e")?;
        let rotate_text = caption(&mut reel, "Rotation: All Axes Wobble", "#a855f7")?;
        let rest_text = reel.screen_label("Returning to Rest", 0.3, CAPTION_AT, palette.muted)?;
        let summary = reel.screen_label("Raw Acceleration = Gravity + Motion", 0.4, FOOTER_AT, palette.accent)?;

        reel.hide(&[title, device.cube, device.axes, intro_text, tilt_text, walk_text, rotate_text, rest_text, summary])?;
        reel.hide(&panel_groups)?;

        // Scene 1: at rest.
        reel.fade_phase(
            "intro.fade-in",
            1.5,
            &[(device.cube, 0.0, 1.0), (title, 0.0, 1.0), (intro_text, 0.0, 1.0)],
        )?;
        reel.fade_phase("intro.axes", 1.0, &[(device.axes, 0.0, 1.0)])?;
        let panel_fades: Vec<_> = panel_groups.iter().map(|g| (*g, 0.0, 1.0)).collect();
        reel.fade_phase("intro.graphs", 1.0, &panel_fades)?;

        let static_lines = reel.plot_lines(settings.clip("static")?, &graph, max_points, smoothing)?;
        push_reveal(&mut reel, "intro.plot", 1.5, &static_lines)?;
        reel.hold("intro.hold", 0.5)?;

        // Scene 2: tilt.
        reel.fade_phase("tilt.caption", 0.5, &[(intro_text, 1.0, 0.0), (tilt_text, 0.0, 1.0)])?;
        let fades: Vec<_> = static_lines.iter().map(|(id, _)| (*id, 1.0, 0.0)).collect();
        reel.fade_phase("tilt.clear", 0.3, &fades)?;

        let tilt_lines = reel.plot_lines(settings.clip("tilt")?, &graph, max_points, smoothing)?;
        let d = reel.driver("tilt.rotate");
        let mut seg = Segment::builder("tilt.rotate").duration(3.0).target(d, 1.0).bind(
            d,
            Target::Object(device.group),
            AttributeKind::Rotation,
            |v| Attribute::Rotation(Vec3::new(TILT * v, 0.0, 0.0)),
        );
        for (id, curve) in &tilt_lines {
            seg = reveal(seg, d, *id, curve.clone());
        }
        reel.timeline.push(seg.build()?)?;

        push_pulse(&mut reel, "tilt.pulse", &[(device.arrows[2], palette.channels[2])])?;

        let d = reel.driver("tilt.back");
        let seg = Segment::builder("tilt.back")
            .duration(1.2)
            .easing(Easing::Smooth)
            .target(d, 1.0)
            .bind(d, Target::Object(device.group), AttributeKind::Rotation, |v| {
                Attribute::Rotation(Vec3::new(lerp(TILT, 0.0, v), 0.0, 0.0))
            });
        reel.timeline.push(seg.build()?)?;
        reel.hold("tilt.hold", 0.3)?;

        // Scene 3: walking. The device bobs around its resting spot and is
        // put back there when the scene ends.
        let walk_lines = reel.plot_lines(settings.clip("walk")?, &graph, max_points, smoothing)?;
        let mut fades = vec![(tilt_text, 1.0, 0.0), (walk_text, 0.0, 1.0)];
        fades.extend(tilt_lines.iter().map(|(id, _)| (*id, 1.0, 0.0)));
        reel.fade_phase("walk.caption", 0.5, &fades)?;

        let phase = reel.driver("walk.phase");
        let plot = reel.driver("walk.plot");
        let pulse = reel.driver("walk.pulse");
        let home = device.home;
        let mut seg = Segment::builder("walk")
            .duration(4.4)
            .target(phase, 4.4)
            .target_with(DriverTarget::new(plot, 1.0).duration(4.0))
            .target_with(
                DriverTarget::new(pulse, 1.0)
                    .delay(4.0)
                    .duration(0.4)
                    .easing(Easing::ThereAndBack),
            )
            .reset(phase, 0.0)
            .bind(phase, Target::Object(device.group), AttributeKind::Position, move |t| {
                Attribute::Position(home + bob(t))
            })
            .restore_captured(Target::Object(device.group), AttributeKind::Position);
        for (id, curve) in &walk_lines {
            seg = reveal(seg, plot, *id, curve.clone());
        }
        for axis in 0..2 {
            seg = tint(seg, pulse, device.arrows[axis], palette.channels[axis], Color::WHITE);
        }
        reel.timeline.push(seg.build()?)?;
        reel.hold("walk.hold", 0.3)?;

        // Scene 4: rotation. The turn finishes at 2s while the plot keeps
        // drawing until 4s; the group waits for both.
        let rot_lines = reel.plot_lines(settings.clip("rotation")?, &graph, max_points, smoothing)?;
        let mut fades = vec![(walk_text, 1.0, 0.0), (rotate_text, 0.0, 1.0)];
        fades.extend(walk_lines.iter().map(|(id, _)| (*id, 1.0, 0.0)));
        reel.fade_phase("rotation.caption", 0.5, &fades)?;

        let turned = Vec3::new(PI / 6.0, PI / 4.0, 0.0);
        let d = reel.driver("rotation.turn");
        let turn = Segment::builder("rotation.turn")
            .duration(2.0)
            .target(d, 1.0)
            .bind(d, Target::Object(device.group), AttributeKind::Rotation, move |v| {
                Attribute::Rotation(turned.scale(v))
            })
            .build()?;
        let d = reel.driver("rotation.plot");
        let mut plot = Segment::builder("rotation.plot").duration(4.0).target(d, 1.0);
        for (id, curve) in &rot_lines {
            plot = reveal(plot, d, *id, curve.clone());
        }
        reel.timeline.push_parallel("rotation", vec![turn, plot.build()?])?;

        let all_axes: Vec<_> = device.arrows.iter().copied().zip(palette.channels).collect();
        push_pulse(&mut reel, "rotation.pulse", &all_axes)?;
        reel.hold("rotation.hold", 0.3)?;

        // Scene 5: back to rest.
        reel.fade_phase("rest.caption", 0.5, &[(rotate_text, 1.0, 0.0), (rest_text, 0.0, 1.0)])?;

        let settled = Vec3::new(PI / 10.0, 0.0, 0.0);
        let d = reel.driver("rest.turn");
        let turn_back = Segment::builder("rest.turn")
            .duration(1.5)
            .easing(Easing::Smooth)
            .target(d, 1.0)
            .bind(d, Target::Object(device.group), AttributeKind::Rotation, move |v| {
                Attribute::Rotation(turned.lerp(&settled, v))
            })
            .build()?;
        let d = reel.driver("rest.clear");
        let mut clear = Segment::builder("rest.clear").duration(1.5).easing(Easing::Smooth).target(d, 1.0);
        for (id, _) in &rot_lines {
            clear = fade(clear, d, *id, 1.0, 0.0);
        }
        reel.timeline.push_parallel("rest.settle", vec![turn_back, clear.build()?])?;

        let final_lines = reel.plot_lines(settings.clip("final")?, &graph, max_points, smoothing)?;
        push_reveal(&mut reel, "rest.plot", 1.0, &final_lines)?;
        reel.fade_phase("rest.caption-out", 0.3, &[(rest_text, 1.0, 0.0)])?;

        let d = reel.driver("rest.summary");
        let seg = Segment::builder("rest.summary").duration(1.0).easing(Easing::Smooth).target(d, 1.0);
        let seg = shift(fade(seg, d, summary, 0.0, 1.0), d, summary, FOOTER_AT - LIFT, FOOTER_AT);
        reel.timeline.push(seg.build()?)?;

        for n in 1..=2 {
            let name = format!("rest.cube-pulse.{}", n);
            let d = reel.driver(&name);
            let accent = palette.accent;
            let seg = Segment::builder(name.as_str())
                .duration(0.6)
                .easing(Easing::ThereAndBack)
                .target(d, 1.0)
                .bind(d, Target::Object(device.cube), AttributeKind::StrokeWidth, |v| {
                    Attribute::StrokeWidth(lerp(2.5, 4.0, v))
                });
            let seg = tint(seg, d, device.cube, Color::WHITE, accent);
            reel.timeline.push(seg.build()?)?;
        }

        let (phi, theta) = (settings.camera.phi.to_radians(), settings.camera.theta.to_radians());
        let pulled = (phi - 10f32.to_radians(), theta - 10f32.to_radians());
        let d = reel.driver("rest.camera");
        let seg = Segment::builder("rest.camera")
            .duration(1.5)
            .easing(Easing::Smooth)
            .target(d, 1.0)
            .bind(d, Target::Camera, AttributeKind::Orientation, move |v| Attribute::Orientation {
                phi: lerp(phi, pulled.0, v),
                theta: lerp(theta, pulled.1, v),
            });
        reel.timeline.push(seg.build()?)?;
        reel.hold("rest.hold", 0.5)?;

        info!(
            "built '{}': {} phases, {:.1}s, {} nodes",
            self.name(),
            reel.timeline.phases().len(),
            reel.timeline.total_duration(),
            reel.scene.len()
        );
        Ok(reel)
    }
}

/// One shared linear driver revealing every line at once.
fn push_reveal(reel: &mut Reel, name: &str, seconds: f32, lines: &[(ObjectId, PartialCurve)]) -> Result<()> {
    let d = reel.driver(name);
    let mut seg = Segment::builder(name).duration(seconds).target(d, 1.0);
    for (id, curve) in lines {
        seg = reveal(seg, d, *id, curve.clone());
    }
    reel.timeline.push(seg.build()?)?;
    Ok(())
}

/// Flashes each arrow white and back.
fn push_pulse(reel: &mut Reel, name: &str, arrows: &[(ObjectId, Color)]) -> Result<()> {
    let d = reel.driver(name);
    let mut seg = Segment::builder(name)
        .duration(0.4)
        .easing(Easing::ThereAndBack)
        .target(d, 1.0);
    for &(id, base) in arrows {
        seg = tint(seg, d, id, base, Color::WHITE);
    }
    reel.timeline.push(seg.build()?)?;
    Ok(())
}

/// Five seconds: captions in, three noisy traces drawn, hold, captions out.
pub struct AccelerometerTeaser;

impl Clip for AccelerometerTeaser {
    fn name(&self) -> &'static str {
        "teaser"
    }

    fn build(&self, config: &Config) -> Result<Reel> {
        let settings = &config.teaser;
        let palette = Palette::new(&config.theme)?;
        let mut reel = Reel::new(settings.camera.camera(), parse_color(&settings.background)?);

        let floor = build_floor(&mut reel.scene, palette.grid)?;
        reel.stage.anchor(&reel.scene, floor, Space::World)?;

        let device = build_device(&mut reel.scene, &palette, 1.8, 1.8, Vec3::new(-2.7, 0.4, 0.0))?;
        let gravity = reel.scene.add_arrow(
            "gravity",
            Vec3::new(0.0, 1.2, 0.0),
            Vec3::new(0.0, -1.2, 0.0),
            palette.channels[2],
        )?;
        let gravity_label = reel
            .scene
            .add_label("Gravity", 0.3, Vec3::new(-0.7, -1.2, 0.0), palette.channels[2]);
        reel.stage.attach(&mut reel.scene, device.group, gravity)?;
        reel.stage.attach(&mut reel.scene, device.group, gravity_label)?;
        reel.stage.anchor(&reel.scene, device.group, Space::World)?;

        let mut graph = panels(
            &palette,
            [Vec3::new(3.2, 1.6, 0.0), Vec3::new(3.2, 0.1, 0.0), Vec3::new(3.2, -1.4, 0.0)],
            (-1.5, 1.5),
            4.2,
            1.2,
        );
        for (panel, name) in graph.iter_mut().zip(["X", "Y", "Z"]) {
            panel.grid = vec![0.0];
            panel.title = Some(format!("{}-axis", name));
            panel.build(&mut reel.scene, &mut reel.stage)?;
        }

        let caption = reel.screen_label("3-axis accelerometer", 0.45, TITLE_AT - LIFT, parse_color("#ffff00")?)?;
        let still_text = reel.screen_label(
            "Still \u{2192} Gravity dominates Z-axis",
            0.35,
            FOOTER_AT,
            palette.muted,
        )?;
        reel.hide(&[caption, still_text])?;

        let d = reel.driver("teaser.captions");
        let seg = Segment::builder("teaser.captions").duration(0.8).easing(Easing::Smooth).target(d, 1.0);
        let seg = fade(seg, d, caption, 0.0, 1.0);
        let seg = shift(seg, d, caption, TITLE_AT - LIFT.scale(2.0), TITLE_AT - LIFT);
        let seg = fade(seg, d, still_text, 0.0, 1.0);
        reel.timeline.push(seg.build()?)?;

        // One tracker per trace, zeroed before the reveal.
        let lines = reel.plot_lines(settings.clip("still")?, &graph, config.max_display_points, 0)?;
        let mut seg = Segment::builder("teaser.reveal").duration(2.0);
        for (i, (id, curve)) in lines.iter().enumerate() {
            let d = reel.driver(&format!("teaser.trace{}", i));
            seg = reveal(seg.reset(d, 0.0).target(d, 1.0), d, *id, curve.clone());
        }
        reel.timeline.push(seg.build()?)?;

        reel.hold("teaser.hold", 2.0)?;
        reel.fade_phase("teaser.still-out", 0.4, &[(still_text, 1.0, 0.0)])?;
        reel.fade_phase("teaser.caption-out", 0.4, &[(caption, 1.0, 0.0)])?;

        info!(
            "built '{}': {} phases, {:.1}s",
            self.name(),
            reel.timeline.phases().len(),
            reel.timeline.total_duration()
        );
        Ok(reel)
    }
}

/// Faint floor grid under the teaser device.
fn build_floor(scene: &mut Scene, color: Color) -> Result<ObjectId> {
    let scale = 1.8;
    let y = -0.5;
    let color = color.with_alpha(0.3);
    let mut lines = Vec::new();
    for i in -6..=6 {
        let x = i as f32 * scale;
        lines.push(scene.add_polyline(
            "floor.x",
            vec![Vec3::new(x, y, -4.0 * scale), Vec3::new(x, y, 4.0 * scale)],
            color,
        ));
    }
    for j in -4..=4 {
        let z = j as f32 * scale;
        lines.push(scene.add_polyline(
            "floor.z",
            vec![Vec3::new(-6.0 * scale, y, z), Vec3::new(6.0 * scale, y, z)],
            color,
        ));
    }
    for id in &lines {
        if let Some(node) = scene.get_mut(*id) {
            node.stroke_width = 1.0;
        }
    }
    Ok(scene.add_group("floor", &lines)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compositor::TimelineState;

    fn run(reel: &mut Reel, dt: f32) -> u64 {
        reel.timeline.start().unwrap();
        let mut frames = 0;
        while !reel.timeline.is_complete() && frames < 10_000 {
            reel.timeline.tick(dt, &mut reel.scene);
            frames += 1;
        }
        frames
    }

    #[test]
    fn test_full_reel_plays_to_rest() {
        let config = Config::default();
        let mut reel = AccelerometerReel.build(&config).unwrap();
        let total = reel.timeline.total_duration();
        assert!((28.0..31.0).contains(&total), "total {}", total);

        let frames = run(&mut reel, 1.0 / 60.0);
        assert_eq!(reel.timeline.state(), TimelineState::Complete);
        assert!(frames < 2000);
        assert!(reel.timeline.registry().is_empty());

        let device = reel
            .scene
            .ids()
            .find(|id| reel.scene.get(*id).map_or(false, |n| n.name == "device"))
            .unwrap();
        let node = reel.scene.get(device).unwrap();
        assert!(node.position.approx_eq(&Vec3::new(-3.8, 0.0, 0.0), 1e-5));
        assert!(node.rotation.approx_eq(&Vec3::new(PI / 10.0, 0.0, 0.0), 1e-5));
        assert!((reel.scene.camera.phi - 55f32.to_radians()).abs() < 1e-5);
        assert!((reel.scene.camera.theta + 55f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_teaser_reveals_traces() {
        let config = Config::default();
        let mut reel = AccelerometerTeaser.build(&config).unwrap();
        run(&mut reel, 1.0 / 60.0);
        let traces: Vec<_> = reel
            .scene
            .ids()
            .filter(|id| reel.scene.get(*id).map_or(false, |n| n.name == "still.line"))
            .collect();
        assert_eq!(traces.len(), 3);
        for id in traces {
            let node = reel.scene.get(id).unwrap();
            assert!(!node.points.is_empty());
            assert!(node.points.len() <= config.max_display_points + 1);
            assert_eq!(reel.stage.space_of(&reel.scene, id), Space::Screen);
        }
    }

    #[test]
    fn test_skip_lands_on_phase_end() {
        let config = Config::default();
        let mut reel = AccelerometerReel.build(&config).unwrap();
        reel.timeline.start().unwrap();
        reel.timeline.tick(0.1, &mut reel.scene);
        reel.timeline.cancel(&mut reel.scene);
        let title = reel.scene.ids().find(|id| {
            reel.scene.get(*id).map_or(false, |n| n.name == "Accelerometer")
        });
        let title = title.unwrap();
        assert_eq!(
            reel.scene.attribute(Target::Object(title), AttributeKind::Opacity),
            Some(Attribute::Opacity(1.0))
        );
    }
}
