//! Reel Banner
//!
//! Finds the header chrome a social app baked into a vertical video, sizes a
//! branding banner that covers it and fits the new content, renders the
//! banner and hands it to ffmpeg to bake into the video.
//!
//! # Pipeline
//!
//! 1. `sample`: decode a few frames near the start of the video.
//! 2. `detect`: per-frame edge analysis of the top quarter, aggregated across
//!    frames into a banner proposal.
//! 3. `layout` + `text`: reconcile the proposal with the space the branding
//!    needs, apply the user's vertical correction.
//! 4. `compose`: draw the overlay.
//! 5. `media`: probe and encode through ffmpeg.
//!
//! `batch` runs that pipeline over every approved reel in a job and records
//! results in the job database (`store`).

pub mod batch;
pub mod branding;
pub mod compose;
pub mod config;
pub mod detect;
pub mod frame;
pub mod layout;
pub mod media;
pub mod sample;
pub mod store;
pub mod text;
pub mod ui;

pub use batch::{BatchDriver, BatchObserver, BatchSummary, ItemError, NoopObserver};
pub use branding::{BrandingConfig, HeadlineSource, OverlayMode};
pub use compose::{FontSet, OverlayCompositor};
pub use config::RunConfig;
pub use detect::{
    aggregate_envelopes, default_detection, detect_header, DetectionResult,
    EdgeDensityDetector, Envelope, EnvelopeDetector, FixedEnvelopeDetector, HeaderBand, Tuning,
};
pub use frame::{VideoDimensions, VideoFrame};
pub use layout::{resolve_layout, BannerPlacement, DesignMetrics, ResolvedLayout};
pub use media::{EncodeRequest, FfmpegCli, FilterGraph, MediaTools};
pub use sample::{FfmpegCliSampler, FrameSampler, DEFAULT_SAMPLE_TIMESTAMPS_MS};
pub use store::{Job, JobDatabase, JobStatus, LayoutPlan, Reel, ReelStatus};
pub use text::TextLayout;
