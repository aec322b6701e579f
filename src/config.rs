use crate::features::signal::{Term, Waveform};
use crate::gfx::camera::Camera;
use crate::gfx::math::Color;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Sleep between frames so playback runs at wall-clock speed.
    #[serde(default)]
    pub realtime: bool,

    #[serde(default = "default_reel")]
    pub reel: ReelKind,

    /// Decimation threshold for plotted curves.
    #[serde(default = "default_max_display_points")]
    pub max_display_points: usize,

    #[serde(default = "default_smoothing_subdivisions")]
    pub smoothing_subdivisions: u32,

    #[serde(default = "default_theme")]
    pub theme: Theme,

    #[serde(default = "default_full")]
    pub full: ReelSettings,

    #[serde(default = "default_teaser")]
    pub teaser: ReelSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReelKind {
    Full,
    Teaser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Degrees.
    pub phi: f32,
    /// Degrees.
    pub theta: f32,
    pub distance: f32,
}

impl CameraConfig {
    pub fn camera(&self) -> Camera {
        Camera::from_degrees(self.phi, self.theta, self.distance)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub title: String,
    pub muted: String,
    pub accent: String,
    pub axis: String,
    pub grid: String,
    /// X, Y and Z channel colors.
    pub channels: [String; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelSettings {
    pub background: String,
    pub camera: CameraConfig,
    pub clips: Vec<SignalClip>,
}

/// Signal constants for one section of a reel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalClip {
    pub name: String,
    pub samples: usize,
    /// Seconds covered by the plot.
    pub window: f32,
    /// X, Y and Z channels.
    pub channels: Vec<Waveform>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            realtime: false,
            reel: default_reel(),
            max_display_points: default_max_display_points(),
            smoothing_subdivisions: default_smoothing_subdivisions(),
            theme: default_theme(),
            full: default_full(),
            teaser: default_teaser(),
        }
    }
}

fn default_frame_rate() -> u32 {
    60
}

fn default_reel() -> ReelKind {
    ReelKind::Full
}

fn default_max_display_points() -> usize {
    80
}

fn default_smoothing_subdivisions() -> u32 {
    2
}

fn default_theme() -> Theme {
    Theme {
        title: "#ffffff".to_string(),
        muted: "#9ca3af".to_string(),
        accent: "#fbbf24".to_string(),
        axis: "#4a5568".to_string(),
        grid: "#2d3748".to_string(),
        channels: [
            "#ef4444".to_string(),
            "#22c55e".to_string(),
            "#3b82f6".to_string(),
        ],
    }
}

fn clip(name: &str, samples: usize, channels: [Waveform; 3]) -> SignalClip {
    SignalClip {
        name: name.to_string(),
        samples,
        window: 5.0,
        channels: channels.to_vec(),
    }
}

fn default_full() -> ReelSettings {
    let walk = 1.8;
    ReelSettings {
        background: "#000000".to_string(),
        camera: CameraConfig {
            phi: 65.0,
            theta: -45.0,
            distance: 20.0,
        },
        clips: vec![
            clip(
                "static",
                150,
                [
                    Waveform::new(0.0, vec![Term::sine(0.04, 0.25, 0.0)]),
                    Waveform::new(0.0, vec![Term::sine(0.04, 0.18, PI / 4.0)]),
                    Waveform::new(-1.0, vec![Term::cosine(0.03, 0.15, 0.0)]),
                ],
            ),
            clip(
                "tilt",
                150,
                [
                    Waveform::new(0.0, vec![Term::Arch { amplitude: 0.8, angle: PI / 5.0, cosine: false }]),
                    Waveform::new(0.0, vec![Term::sine(0.05, 0.5, 0.0)]),
                    Waveform::new(0.0, vec![Term::Arch { amplitude: -1.0, angle: PI / 5.0, cosine: true }]),
                ],
            ),
            clip(
                "walk",
                150,
                [
                    Waveform::new(0.0, vec![Term::sine(0.55, walk, 0.0)]),
                    Waveform::new(0.0, vec![Term::cosine(0.4, walk, 0.0)]),
                    Waveform::new(-0.65, vec![Term::sine(0.18, 2.0 * walk, PI / 4.0)]),
                ],
            ),
            clip(
                "rotation",
                150,
                [
                    Waveform::new(0.0, vec![Term::sine(0.4, 0.8, 0.0), Term::sine(0.25, 1.2, 0.0)]),
                    Waveform::new(0.0, vec![Term::cosine(0.35, 0.6, 0.0), Term::cosine(0.2, 1.1, 0.0)]),
                    Waveform::new(-0.5, vec![Term::sine(0.4, 0.5, PI / 3.0)]),
                ],
            ),
            clip(
                "final",
                100,
                [
                    Waveform::new(0.0, vec![Term::sine(0.03, 0.3, PI / 5.0)]),
                    Waveform::new(0.0, vec![Term::sine(0.03, 0.25, 0.0)]),
                    Waveform::new(-1.0, vec![Term::cosine(0.02, 0.2, 0.0)]),
                ],
            ),
        ],
    }
}

fn default_teaser() -> ReelSettings {
    ReelSettings {
        background: "#0f1116".to_string(),
        camera: CameraConfig {
            phi: 60.0,
            theta: -45.0,
            distance: 20.0,
        },
        clips: vec![clip(
            "still",
            240,
            [
                Waveform::new(0.0, vec![Term::Noise { sigma: 0.02, seed: 4 }]),
                Waveform::new(0.0, vec![Term::Noise { sigma: 0.02, seed: 5 }]),
                Waveform::new(-1.0, vec![Term::Noise { sigma: 0.02, seed: 6 }]),
            ],
        )],
    }
}

pub fn parse_color(hex: &str) -> Result<Color> {
    match Color::from_hex(hex) {
        Some(color) => Ok(color),
        None => bail!("invalid color '{}'", hex),
    }
}

impl Theme {
    pub fn channel(&self, index: usize) -> Result<Color> {
        match self.channels.get(index) {
            Some(hex) => parse_color(hex),
            None => bail!("no channel color {}", index),
        }
    }
}

impl ReelSettings {
    pub fn clip(&self, name: &str) -> Result<&SignalClip> {
        match self.clips.iter().find(|c| c.name == name) {
            Some(clip) => Ok(clip),
            None => bail!("missing signal clip '{}'", name),
        }
    }
}

impl Config {
    pub fn settings(&self) -> &ReelSettings {
        match self.reel {
            ReelKind::Full => &self.full,
            ReelKind::Teaser => &self.teaser,
        }
    }

    pub fn frame_dt(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }

    /// Rejects values that would make playback meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            bail!("frame_rate must be positive");
        }
        if self.max_display_points < 2 {
            bail!("max_display_points must be at least 2");
        }
        let theme = &self.theme;
        for hex in [&theme.title, &theme.muted, &theme.accent, &theme.axis, &theme.grid] {
            parse_color(hex)?;
        }
        for i in 0..3 {
            theme.channel(i)?;
        }
        for settings in [&self.full, &self.teaser] {
            parse_color(&settings.background)?;
            if settings.camera.distance <= 0.0 {
                bail!("camera distance must be positive");
            }
            for clip in &settings.clips {
                if clip.samples == 0 {
                    bail!("clip '{}' has no samples", clip.name);
                }
                if !clip.window.is_finite() || clip.window <= 0.0 {
                    bail!("clip '{}' has non-positive window {}", clip.name, clip.window);
                }
                if clip.channels.len() != 3 {
                    bail!("clip '{}' needs 3 channels, has {}", clip.name, clip.channels.len());
                }
            }
        }
        Ok(())
    }

    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        let config_path = config_dir.join("cadence").join("config.toml");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&contents)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        let config_dir = config_dir.join("cadence");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.full.clips.len(), 5);
        assert!(config.full.clip("walk").is_ok());
        assert!(config.full.clip("sprint").is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml("frame_rate = 30\nreel = \"teaser\"\n").unwrap();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.reel, ReelKind::Teaser);
        assert_eq!(config.settings().clips[0].samples, 240);
        assert_eq!(config.max_display_points, 80);
    }

    #[test]
    fn test_rejects_zero_frame_rate() {
        let config = Config {
            frame_rate: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_clip() {
        let mut config = Config::default();
        config.teaser.clips[0].window = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.theme.accent = "yellow".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_terms() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.full.clips[1].channels, config.full.clips[1].channels);
    }
}
