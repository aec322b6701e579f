//! Command-line arguments for the headless runner.

use crate::config::{Config, ReelKind};
use clap::Parser;

/// Plays an animation reel headless at a fixed simulated frame rate.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Reel to play, overriding the config file
    #[arg(short, long, value_enum)]
    pub reel: Option<ReelKind>,

    /// Sleep between frames to match the configured frame rate
    #[arg(long)]
    pub realtime: bool,

    /// Frame rate override
    #[arg(long)]
    pub fps: Option<u32>,

    /// Write the effective config to disk and exit
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    /// Folds the flags over a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(reel) = self.reel {
            config.reel = reel;
        }
        if self.realtime {
            config.realtime = true;
        }
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
    }
}
