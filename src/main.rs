use anyhow::Result;
use cadence::app::App;
use cadence::cli::Args;
use cadence::config::Config;
use cadence::gfx::draw::FrameRecorder;
use clap::Parser;
use log::{info, warn};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        warn!("config not loaded, using defaults: {}", err);
        Config::default()
    });
    args.apply(&mut config);

    if args.save_config {
        config.save()?;
        info!("wrote config");
        return Ok(());
    }

    let dt = config.frame_dt();
    let realtime = config.realtime;
    let mut app = App::new(config)?;
    let mut renderer = FrameRecorder::default();

    app.play()?;
    let started = Instant::now();
    while !app.is_finished() {
        let frame_start = Instant::now();
        app.update(dt);
        app.render(&mut renderer)?;

        if realtime {
            let budget = Duration::from_secs_f32(dt);
            if let Some(rest) = budget.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    info!(
        "rendered {} frames ({:.2}s simulated) in {:.2?}, {} vertex bytes",
        renderer.frames,
        app.time,
        started.elapsed(),
        renderer.bytes
    );
    Ok(())
}
