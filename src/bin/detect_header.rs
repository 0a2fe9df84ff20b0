//! detect_header - show the detected chrome and resolved banner for one video

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use reel_banner::config::RunConfig;
use reel_banner::{
    detect_header, resolve_layout, BrandingConfig, EdgeDensityDetector, FfmpegCli,
    FfmpegCliSampler, HeaderBand, MediaTools,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to analyse.
    video: PathBuf,
    /// Treat only the profile row as chrome (no headline in the banner).
    #[arg(long)]
    slim: bool,
    /// Print JSON to stdout.
    #[arg(long)]
    json: bool,
    /// JSON file holding a job `config` object to size the banner with.
    #[arg(long, value_name = "FILE")]
    branding: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = RunConfig::load()?;

    let config = match &args.branding {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        }
        None => json!({ "mode": "design" }),
    };
    let mut branding = BrandingConfig::from_job_config(&config)?;
    branding.auto_detect = true;
    if args.slim {
        branding.show_headline = false;
    }

    let media = FfmpegCli::from_settings(&cfg.ffmpeg);
    let dims = media.probe(&args.video)?;
    let sampler = FfmpegCliSampler::new(cfg.ffmpeg.ffmpeg_bin.clone());
    let detector = EdgeDensityDetector::new();

    let headline = branding.headline_for(None);
    let mut band = HeaderBand::for_headline(branding.show_headline);
    let layout = resolve_layout(&branding, dims, headline.as_deref(), |b| {
        band = b;
        detect_header(
            &sampler,
            &detector,
            &args.video,
            dims,
            &cfg.detection.sample_timestamps_ms,
            b,
        )
    });
    let design_min = layout.metrics.design_min_height(layout.headline.as_ref());

    if args.json {
        let out = json!({
            "video": args.video.display().to_string(),
            "width": dims.width,
            "height": dims.height,
            "band": band,
            "detection": layout.detection,
            "design_min_height": design_min,
            "layout": layout.plan,
            "headline_lines": layout.headline.as_ref().map(|t| t.lines.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} ({}x{})", args.video.display(), dims.width, dims.height);
    println!("  band:        {:?}", band);
    if let Some(d) = layout.detection {
        println!(
            "  detection:   y={} h={} padding={}",
            d.y, d.height, d.content_padding
        );
    }
    println!("  content min: {}", design_min);
    println!(
        "  banner:      y={} h={} padding={}",
        layout.placement.y, layout.placement.height, layout.placement.content_padding
    );
    if let Some(text) = &layout.headline {
        for line in &text.lines {
            println!("  | {}", line);
        }
    }
    Ok(())
}
