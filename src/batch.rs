//! Batch driver.
//!
//! Walks a job's approved reels in order, bakes the header overlay into each
//! and records the result in the job database. One reel failing never stops
//! the batch; only database and configuration problems are fatal.

use anyhow::{Context, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::branding::{BrandingConfig, OverlayMode};
use crate::compose::OverlayCompositor;
use crate::detect::{detect_header, EnvelopeDetector, HeaderBand};
use crate::frame::VideoDimensions;
use crate::layout::{resolve_layout, BannerPlacement};
use crate::media::{AuxInput, EncodeRequest, FilterGraph, MediaTools};
use crate::sample::{FrameSampler, DEFAULT_SAMPLE_TIMESTAMPS_MS};
use crate::store::{JobDatabase, JobStatus, Reel};

/// User-supplied header image for upload mode, inside the job directory.
pub const HEADER_OVERLAY_FILE: &str = "header_overlay.png";
/// Logo for design mode, inside the job directory.
pub const LOGO_FILE: &str = "logo.png";
pub const OUTPUT_PREFIX: &str = "processed_";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why one reel was not processed.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("no local video file recorded or found")]
    NoLocalFile,
    #[error("input video missing: {}", .0.display())]
    InputMissing(PathBuf),
    #[error("header overlay missing: {}", .0.display())]
    OverlayMissing(PathBuf),
    #[error("probe failed")]
    Probe(#[source] BoxError),
    #[error("overlay render failed")]
    Render(#[source] BoxError),
    #[error("encode failed")]
    Encode(#[source] BoxError),
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Reel ids written successfully.
    pub processed: Vec<String>,
    pub failed: Vec<(String, ItemError)>,
    /// Approved reels skipped because they already have an output.
    pub skipped_terminal: usize,
    pub cancelled: bool,
}

/// Progress callbacks. All methods default to no-ops.
pub trait BatchObserver {
    fn batch_started(&mut self, _total: usize) {}
    fn item_started(&mut self, _index: usize, _reel_id: &str) {}
    fn item_finished(&mut self, _reel_id: &str, _outcome: Result<&str, &ItemError>) {}
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

pub struct BatchDriver {
    media: Box<dyn MediaTools>,
    sampler: Box<dyn FrameSampler>,
    detector: Box<dyn EnvelopeDetector>,
    compositor: OverlayCompositor,
    downloads_dir: PathBuf,
    fallback_source_dir: Option<PathBuf>,
    timestamps_ms: Vec<u64>,
    reprocess: bool,
    cancel: Arc<AtomicBool>,
}

impl BatchDriver {
    pub fn new(
        media: Box<dyn MediaTools>,
        sampler: Box<dyn FrameSampler>,
        detector: Box<dyn EnvelopeDetector>,
        compositor: OverlayCompositor,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media,
            sampler,
            detector,
            compositor,
            downloads_dir: downloads_dir.into(),
            fallback_source_dir: None,
            timestamps_ms: DEFAULT_SAMPLE_TIMESTAMPS_MS.to_vec(),
            reprocess: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_fallback_source_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.fallback_source_dir = dir;
        self
    }

    pub fn with_sample_timestamps(mut self, timestamps_ms: Vec<u64>) -> Self {
        self.timestamps_ms = timestamps_ms;
        self
    }

    /// Also process reels that already have an output.
    pub fn with_reprocess(mut self, reprocess: bool) -> Self {
        self.reprocess = reprocess;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.downloads_dir.join(job_id)
    }

    pub fn run(
        &self,
        db: &mut JobDatabase,
        job_id: &str,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchSummary> {
        let job = db.job(job_id)?;
        let branding = BrandingConfig::from_job_config(&job.config)
            .with_context(|| format!("job {} has an invalid config", job_id))?;
        let job_dir = self.job_dir(job_id);

        let mut summary = BatchSummary::default();
        let mut pending = Vec::new();
        for (idx, reel) in job.reels.iter().enumerate() {
            if !reel.is_approved() {
                continue;
            }
            if reel.is_terminal() && !self.reprocess {
                log::debug!("{}: already processed, skipping", reel.id);
                summary.skipped_terminal += 1;
                continue;
            }
            pending.push(idx);
        }

        log::info!(
            "job {}: {:?} mode, auto-detect {}, {} reel(s) to process",
            job_id,
            branding.mode,
            branding.auto_detect,
            pending.len()
        );
        observer.batch_started(pending.len());

        for (n, idx) in pending.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                log::warn!("cancelled; {} reel(s) processed so far", summary.processed.len());
                summary.cancelled = true;
                break;
            }

            let mut reel = db.job(job_id)?.reels[idx].clone();
            observer.item_started(n, &reel.id);

            let outcome = self.process_reel(&branding, &job_dir, &mut reel);
            let reel_id = reel.id.clone();
            match &outcome {
                Ok(output) => {
                    log::info!("{}: saved {}", reel_id, output);
                    reel.processed_path = Some(output.clone());
                }
                Err(e) => {
                    log::error!("{}: {}", reel_id, chain(e));
                }
            }
            db.job_mut(job_id)?.reels[idx] = reel;

            match outcome {
                Ok(output) => {
                    db.persist()?;
                    observer.item_finished(&reel_id, Ok(output.as_str()));
                    summary.processed.push(reel_id);
                }
                Err(e) => {
                    observer.item_finished(&reel_id, Err(&e));
                    summary.failed.push((reel_id, e));
                }
            }
        }

        if !summary.cancelled {
            db.job_mut(job_id)?.status = JobStatus::Completed;
        }
        db.persist()?;

        log::info!(
            "job {}: {} processed, {} failed, {} already done{}",
            job_id,
            summary.processed.len(),
            summary.failed.len(),
            summary.skipped_terminal,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        Ok(summary)
    }

    /// Bake one reel. Returns the output file name.
    fn process_reel(
        &self,
        branding: &BrandingConfig,
        job_dir: &Path,
        reel: &mut Reel,
    ) -> Result<String, ItemError> {
        let input = self.resolve_input(job_dir, reel)?;
        let dims = self
            .media
            .probe(&input)
            .map_err(|e| ItemError::Probe(e.into()))?;

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ItemError::InputMissing(input.clone()))?;
        let output_name = format!("{}{}", OUTPUT_PREFIX, file_name);
        let output = job_dir.join(&output_name);

        match branding.mode {
            OverlayMode::Upload => {
                let overlay = job_dir.join(HEADER_OVERLAY_FILE);
                if !overlay.is_file() {
                    return Err(ItemError::OverlayMissing(overlay));
                }
                let banner = self.upload_banner(branding, &input, dims);
                self.encode(EncodeRequest {
                    input,
                    aux_inputs: vec![AuxInput::looped_image(overlay)],
                    filter_graph: FilterGraph::static_header(dims.width, banner.height, banner.y),
                    output,
                })?;
            }
            OverlayMode::Design => {
                let headline = branding.headline_for(reel.generated_headline.as_deref());
                let layout = resolve_layout(branding, dims, headline.as_deref(), |band| {
                    detect_header(
                        self.sampler.as_ref(),
                        self.detector.as_ref(),
                        &input,
                        dims,
                        &self.timestamps_ms,
                        band,
                    )
                });
                log::info!(
                    "{}: banner y={} h={} (correction {})",
                    reel.id,
                    layout.placement.y,
                    layout.placement.height,
                    branding.vertical_correction
                );
                reel.layout = Some(layout.plan);

                let logo = job_dir.join(LOGO_FILE);
                let logo = logo.is_file().then_some(logo.as_path());
                let overlay = self.compositor.render(branding, dims, &layout, logo);

                // Dropped on every exit path.
                let temp = tempfile::Builder::new()
                    .prefix(&format!("temp_overlay_{}_", reel.id))
                    .suffix(".png")
                    .tempfile_in(job_dir)
                    .map_err(|e| ItemError::Render(e.into()))?;
                overlay
                    .save_with_format(temp.path(), ImageFormat::Png)
                    .map_err(|e| ItemError::Render(e.into()))?;

                self.encode(EncodeRequest {
                    input,
                    aux_inputs: vec![AuxInput::looped_image(temp.path())],
                    filter_graph: FilterGraph::full_frame_overlay(),
                    output,
                })?;
            }
        }
        Ok(output_name)
    }

    fn resolve_input(&self, job_dir: &Path, reel: &Reel) -> Result<PathBuf, ItemError> {
        let recorded = reel
            .local_video_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let name = match recorded {
            Some(name) => PathBuf::from(name),
            None => {
                let guessed = PathBuf::from(format!("{}.mp4", reel.id));
                if !job_dir.join(&guessed).is_file() {
                    return Err(ItemError::NoLocalFile);
                }
                log::info!("{}: no file recorded, found {}", reel.id, guessed.display());
                guessed
            }
        };

        let primary = job_dir.join(&name);
        if primary.is_file() {
            return Ok(primary);
        }
        if let Some(source_dir) = &self.fallback_source_dir {
            let fallback = source_dir.join(&name);
            if fallback.is_file() {
                log::info!("{}: using fallback source {}", reel.id, fallback.display());
                return Ok(fallback);
            }
        }
        Err(ItemError::InputMissing(primary))
    }

    fn upload_banner(&self, branding: &BrandingConfig, input: &Path, dims: VideoDimensions) -> BannerPlacement {
        if !branding.auto_detect {
            return BannerPlacement::fixed(dims);
        }
        BannerPlacement::from(detect_header(
            self.sampler.as_ref(),
            self.detector.as_ref(),
            input,
            dims,
            &self.timestamps_ms,
            HeaderBand::Full,
        ))
    }

    fn encode(&self, request: EncodeRequest) -> Result<(), ItemError> {
        self.media
            .encode(&request)
            .map_err(|e| ItemError::Encode(e.into()))
    }
}

/// `error: cause: cause` on one line.
pub fn chain(err: &ItemError) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
