use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sample::DEFAULT_SAMPLE_TIMESTAMPS_MS;

const DEFAULT_DB_PATH: &str = "data/jobs.json";
const DEFAULT_DOWNLOADS_DIR: &str = "public/downloads";
const DEFAULT_FONTS_DIR: &str = "public/fonts";
const DEFAULT_BADGE_PATH: &str = "public/Twitter_Verified_Badge_Gold.svg.png";
const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
const DEFAULT_FFPROBE_BIN: &str = "ffprobe";
const DEFAULT_VIDEO_CODEC: &str = "libx264";
const DEFAULT_PRESET: &str = "ultrafast";
const DEFAULT_PIX_FMT: &str = "yuv420p";

#[derive(Debug, Deserialize, Default)]
struct RunConfigFile {
    db_path: Option<PathBuf>,
    downloads_dir: Option<PathBuf>,
    fallback_source_dir: Option<PathBuf>,
    assets: Option<AssetsConfigFile>,
    ffmpeg: Option<FfmpegConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetsConfigFile {
    fonts_dir: Option<PathBuf>,
    badge_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FfmpegConfigFile {
    ffmpeg_bin: Option<PathBuf>,
    ffprobe_bin: Option<PathBuf>,
    video_codec: Option<String>,
    preset: Option<String>,
    pix_fmt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    sample_timestamps_ms: Option<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub db_path: PathBuf,
    /// Parent of the per-job directories (`<downloads_dir>/<job id>`).
    pub downloads_dir: PathBuf,
    /// Searched for `<file name>` when a reel's recorded video is missing.
    pub fallback_source_dir: Option<PathBuf>,
    pub assets: AssetSettings,
    pub ffmpeg: FfmpegSettings,
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub fonts_dir: PathBuf,
    pub badge_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub video_codec: String,
    pub preset: String,
    pub pix_fmt: String,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub sample_timestamps_ms: Vec<u64>,
}

impl RunConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("REEL_BANNER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Job directory for `job_id`.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.downloads_dir.join(job_id)
    }

    fn from_file(file: RunConfigFile) -> Self {
        let assets = file.assets.unwrap_or_default();
        let ffmpeg = file.ffmpeg.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        Self {
            db_path: file
                .db_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            downloads_dir: file
                .downloads_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOADS_DIR)),
            fallback_source_dir: file.fallback_source_dir,
            assets: AssetSettings {
                fonts_dir: assets
                    .fonts_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FONTS_DIR)),
                badge_path: assets
                    .badge_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BADGE_PATH)),
            },
            ffmpeg: FfmpegSettings {
                ffmpeg_bin: ffmpeg
                    .ffmpeg_bin
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG_BIN)),
                ffprobe_bin: ffmpeg
                    .ffprobe_bin
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FFPROBE_BIN)),
                video_codec: ffmpeg
                    .video_codec
                    .unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string()),
                preset: ffmpeg.preset.unwrap_or_else(|| DEFAULT_PRESET.to_string()),
                pix_fmt: ffmpeg.pix_fmt.unwrap_or_else(|| DEFAULT_PIX_FMT.to_string()),
            },
            detection: DetectionSettings {
                sample_timestamps_ms: detection
                    .sample_timestamps_ms
                    .unwrap_or_else(|| DEFAULT_SAMPLE_TIMESTAMPS_MS.to_vec()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_path("REEL_BANNER_DB_PATH") {
            self.db_path = path;
        }
        if let Some(path) = env_path("REEL_BANNER_DOWNLOADS_DIR") {
            self.downloads_dir = path;
        }
        if let Some(path) = env_path("REEL_BANNER_FALLBACK_SOURCE_DIR") {
            self.fallback_source_dir = Some(path);
        }
        if let Some(path) = env_path("REEL_BANNER_FONTS_DIR") {
            self.assets.fonts_dir = path;
        }
        if let Some(path) = env_path("REEL_BANNER_BADGE_PATH") {
            self.assets.badge_path = path;
        }
        if let Some(path) = env_path("REEL_BANNER_FFMPEG") {
            self.ffmpeg.ffmpeg_bin = path;
        }
        if let Some(path) = env_path("REEL_BANNER_FFPROBE") {
            self.ffmpeg.ffprobe_bin = path;
        }
        if let Some(codec) = env_token("REEL_BANNER_VIDEO_CODEC") {
            self.ffmpeg.video_codec = codec;
        }
        if let Some(preset) = env_token("REEL_BANNER_PRESET") {
            self.ffmpeg.preset = preset;
        }
        if let Some(pix_fmt) = env_token("REEL_BANNER_PIX_FMT") {
            self.ffmpeg.pix_fmt = pix_fmt;
        }
        if let Ok(timestamps) = std::env::var("REEL_BANNER_SAMPLE_TIMESTAMPS_MS") {
            let parsed = split_csv(&timestamps)
                .iter()
                .map(|t| t.parse::<u64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| {
                    anyhow!("REEL_BANNER_SAMPLE_TIMESTAMPS_MS must be a comma-separated list of milliseconds")
                })?;
            self.detection.sample_timestamps_ms = parsed;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.detection.sample_timestamps_ms.is_empty() {
            return Err(anyhow!("detection.sample_timestamps_ms must not be empty"));
        }
        self.detection.sample_timestamps_ms.sort_unstable();
        self.detection.sample_timestamps_ms.dedup();

        for (key, value) in [
            ("ffmpeg.video_codec", &self.ffmpeg.video_codec),
            ("ffmpeg.preset", &self.ffmpeg.preset),
            ("ffmpeg.pix_fmt", &self.ffmpeg.pix_fmt),
        ] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                return Err(anyhow!("{} must be a single non-empty token", key));
            }
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RunConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn env_token(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
