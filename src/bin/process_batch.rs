//! process_batch - bake branding headers into a job's approved reels
//!
//! Reads the job database, renders or scales the header for each approved
//! reel and writes `processed_<file>` next to the source video. Ctrl-C stops
//! after the reel currently encoding; progress so far is kept.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reel_banner::config::RunConfig;
use reel_banner::sample::FrameSampler;
use reel_banner::ui::Ui;
use reel_banner::{BatchDriver, EdgeDensityDetector, FfmpegCli, JobDatabase, OverlayCompositor};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Job id (top-level key in the job database).
    job_id: String,
    /// Process reels that already have an output.
    #[arg(long)]
    reprocess: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = RunConfig::load()?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
            log::warn!("interrupt received; finishing the current reel");
        })
        .context("install Ctrl-C handler")?;
    }

    let mut db = {
        let _stage = ui.stage("Load job database");
        JobDatabase::load(&cfg.db_path)?
    };
    log::debug!("job database: {}", db.path().display());
    let compositor = {
        let _stage = ui.stage("Load fonts and badge");
        OverlayCompositor::load(&cfg.assets)
    };

    let driver = BatchDriver::new(
        Box::new(FfmpegCli::from_settings(&cfg.ffmpeg)),
        frame_sampler(&cfg),
        Box::new(EdgeDensityDetector::new()),
        compositor,
        &cfg.downloads_dir,
    )
    .with_fallback_source_dir(cfg.fallback_source_dir.clone())
    .with_sample_timestamps(cfg.detection.sample_timestamps_ms.clone())
    .with_reprocess(args.reprocess)
    .with_cancel_flag(cancel);

    let summary = {
        let mut progress = ui.items();
        driver.run(&mut db, &args.job_id, &mut progress)?
    };

    println!(
        "job {}: {} processed, {} failed, {} already processed{}",
        args.job_id,
        summary.processed.len(),
        summary.failed.len(),
        summary.skipped_terminal,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

#[cfg(feature = "decode-ffmpeg-next")]
fn frame_sampler(_cfg: &RunConfig) -> Box<dyn FrameSampler> {
    Box::new(reel_banner::sample::FfmpegNextSampler::new())
}

#[cfg(not(feature = "decode-ffmpeg-next"))]
fn frame_sampler(cfg: &RunConfig) -> Box<dyn FrameSampler> {
    Box::new(reel_banner::FfmpegCliSampler::new(cfg.ffmpeg.ffmpeg_bin.clone()))
}
