use crate::config::{Config, ReelKind};
use crate::engine::compositor::{TickReport, Timeline};
use crate::engine::overlay::Stage;
use crate::features::accelerometer::{AccelerometerReel, AccelerometerTeaser};
use crate::features::{Clip, Reel};
use crate::gfx::draw::Renderer;
use crate::gfx::scene::Scene;
use anyhow::Result;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackMode {
    Idle,
    Playing,
    Finished,
}

pub struct App {
    pub config: Config,
    pub mode: PlaybackMode,
    pub timeline: Timeline,
    pub scene: Scene,
    pub stage: Stage,
    pub time: f32,
    pub clip_name: &'static str,
    last_report: TickReport,
}

impl App {
    /// Builds the reel selected in the config.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let clip: &dyn Clip = match config.reel {
            ReelKind::Full => &AccelerometerReel,
            ReelKind::Teaser => &AccelerometerTeaser,
        };
        Self::with_clip(config, clip)
    }

    pub fn with_clip(config: Config, clip: &dyn Clip) -> Result<Self> {
        let Reel {
            timeline,
            scene,
            stage,
        } = clip.build(&config)?;
        Ok(Self {
            config,
            mode: PlaybackMode::Idle,
            timeline,
            scene,
            stage,
            time: 0.0,
            clip_name: clip.name(),
            last_report: TickReport::default(),
        })
    }

    pub fn play(&mut self) -> Result<()> {
        if self.mode == PlaybackMode::Idle {
            self.timeline.start()?;
            self.mode = PlaybackMode::Playing;
            info!(
                "playing '{}' ({:.1}s at {} fps)",
                self.clip_name,
                self.timeline.total_duration(),
                self.config.frame_rate
            );
        }
        Ok(())
    }

    pub fn update(&mut self, dt: f32) {
        if self.mode != PlaybackMode::Playing {
            return;
        }
        self.time += dt;
        self.last_report = self.timeline.tick(dt, &mut self.scene);
        if let Some(name) = &self.last_report.finished {
            info!("t={:.2}s finished '{}'", self.time, name);
        }
        if self.timeline.is_complete() {
            self.mode = PlaybackMode::Finished;
            info!("'{}' finished after {} frames", self.clip_name, self.timeline.frame());
        }
    }

    /// Jumps to the end of whatever is on screen.
    pub fn skip(&mut self) {
        if self.mode == PlaybackMode::Playing {
            self.timeline.cancel(&mut self.scene);
            if self.timeline.is_complete() {
                self.mode = PlaybackMode::Finished;
            }
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        let frame = self.stage.compose(&self.scene, self.timeline.frame(), self.time);
        renderer.present(&frame)
    }

    pub fn is_finished(&self) -> bool {
        self.mode == PlaybackMode::Finished
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::draw::FrameRecorder;

    #[test]
    fn test_teaser_plays_and_renders() {
        let config = Config {
            reel: ReelKind::Teaser,
            ..Config::default()
        };
        let mut app = App::new(config).unwrap();
        assert_eq!(app.mode, PlaybackMode::Idle);
        app.update(0.5);
        assert_eq!(app.time, 0.0);

        app.play().unwrap();
        let mut recorder = FrameRecorder::default();
        let dt = app.config.frame_dt();
        while !app.is_finished() {
            app.update(dt);
            app.render(&mut recorder).unwrap();
        }
        assert!(recorder.frames > 300);
        assert!(recorder.bytes > 0);
        let last = recorder.last.unwrap();
        assert!(!last.items.is_empty());
    }

    #[test]
    fn test_skip_walks_through_phases() {
        let mut app = App::new(Config::default()).unwrap();
        app.play().unwrap();
        let phases = app.timeline.phases().len();
        for _ in 0..phases {
            app.skip();
        }
        assert!(app.is_finished());
        assert!(app.timeline.registry().is_empty());
    }
}
