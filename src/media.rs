//! Probe and encode through the ffmpeg command-line tools.
//!
//! `MediaTools` is the seam the batch driver talks to; `FfmpegCli` runs the
//! real binaries. Filter graphs are built by `FilterGraph` so their text is
//! testable without spawning anything.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use crate::config::FfmpegSettings;
use crate::frame::VideoDimensions;

/// An extra input placed after the main video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxInput {
    pub path: PathBuf,
    /// Repeat a still image for the length of the video.
    pub loop_image: bool,
}

impl AuxInput {
    pub fn looped_image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_image: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterGraph(String);

impl FilterGraph {
    /// Full-frame transparent overlay on input 1, composited at the origin.
    pub fn full_frame_overlay() -> Self {
        Self("[0:v][1:v]overlay=0:0:shortest=1".to_string())
    }

    /// Scale and crop input 1 to `width`x`height`, composite at row `y`.
    pub fn static_header(width: u32, height: i32, y: i32) -> Self {
        Self(format!(
            "[1:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}[header];\
             [0:v][header]overlay=0:{y}:shortest=1",
            w = width,
            h = height,
            y = y
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub aux_inputs: Vec<AuxInput>,
    pub filter_graph: FilterGraph,
    pub output: PathBuf,
}

pub trait MediaTools {
    fn probe(&self, path: &Path) -> Result<VideoDimensions>;
    fn encode(&self, request: &EncodeRequest) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    pub video_codec: String,
    pub preset: String,
    pub pix_fmt: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            pix_fmt: "yuv420p".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FfmpegCli {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
    encoder: EncoderSettings,
}

impl FfmpegCli {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            encoder: EncoderSettings::default(),
        }
    }

    pub fn from_settings(settings: &FfmpegSettings) -> Self {
        Self {
            ffmpeg_bin: settings.ffmpeg_bin.clone(),
            ffprobe_bin: settings.ffprobe_bin.clone(),
            encoder: EncoderSettings {
                video_codec: settings.video_codec.clone(),
                preset: settings.preset.clone(),
                pix_fmt: settings.pix_fmt.clone(),
            },
        }
    }

    /// Argument list for `request`, without the program name.
    pub fn encode_args(&self, request: &EncodeRequest) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(&request.input)];
        for aux in &request.aux_inputs {
            if aux.loop_image {
                args.push("-loop".to_string());
                args.push("1".to_string());
            }
            args.push("-i".to_string());
            args.push(path_arg(&aux.path));
        }
        args.extend(
            [
                "-filter_complex",
                request.filter_graph.as_str(),
                "-c:a",
                "copy",
                "-c:v",
                self.encoder.video_codec.as_str(),
                "-preset",
                self.encoder.preset.as_str(),
                "-pix_fmt",
                self.encoder.pix_fmt.as_str(),
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(path_arg(&request.output));
        args
    }
}

impl MediaTools for FfmpegCli {
    fn probe(&self, path: &Path) -> Result<VideoDimensions> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn {}", self.ffprobe_bin.display()))?;
        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("probe {}", path.display()))
    }

    fn encode(&self, request: &EncodeRequest) -> Result<()> {
        let args = self.encode_args(request);
        log::debug!("{} {}", self.ffmpeg_bin.display(), args.join(" "));
        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn {}", self.ffmpeg_bin.display()))?;
        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg exited with {} encoding {}: {}",
                output.status,
                request.output.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Parse ffprobe's `WIDTHxHEIGHT` line.
pub fn parse_probe_output(stdout: &str) -> Result<VideoDimensions> {
    static DIMS: OnceLock<Regex> = OnceLock::new();
    let re = DIMS.get_or_init(|| Regex::new(r"(?m)^\s*(\d+)x(\d+)").unwrap());
    let caps = re
        .captures(stdout)
        .ok_or_else(|| anyhow!("unexpected ffprobe output: '{}'", stdout.trim()))?;
    let width: u32 = caps[1].parse().context("width")?;
    let height: u32 = caps[2].parse().context("height")?;
    Ok(VideoDimensions::new(width, height))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_dimensions() {
        assert_eq!(
            parse_probe_output("1080x1920\n").unwrap(),
            VideoDimensions::new(1080, 1920)
        );
        // Some containers report a trailing separator.
        assert_eq!(
            parse_probe_output("720x1280x\n").unwrap(),
            VideoDimensions::new(720, 1280)
        );
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("N/A").is_err());
    }

    #[test]
    fn filter_graph_text() {
        assert_eq!(
            FilterGraph::full_frame_overlay().as_str(),
            "[0:v][1:v]overlay=0:0:shortest=1"
        );
        assert_eq!(
            FilterGraph::static_header(1080, 288, 0).as_str(),
            "[1:v]scale=1080:288:force_original_aspect_ratio=increase,crop=1080:288[header];\
             [0:v][header]overlay=0:0:shortest=1"
        );
    }

    #[test]
    fn encode_arguments() {
        let cli = FfmpegCli::new("ffmpeg", "ffprobe");
        let args = cli.encode_args(&EncodeRequest {
            input: PathBuf::from("jobs/a/r1.mp4"),
            aux_inputs: vec![AuxInput::looped_image("jobs/a/overlay.png")],
            filter_graph: FilterGraph::full_frame_overlay(),
            output: PathBuf::from("jobs/a/processed_r1.mp4"),
        });
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "jobs/a/r1.mp4",
                "-loop",
                "1",
                "-i",
                "jobs/a/overlay.png",
                "-filter_complex",
                "[0:v][1:v]overlay=0:0:shortest=1",
                "-c:a",
                "copy",
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-pix_fmt",
                "yuv420p",
                "jobs/a/processed_r1.mp4",
            ]
        );
    }

    #[test]
    fn missing_binary_is_an_error() {
        let cli = FfmpegCli::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(cli.probe(Path::new("clip.mp4")).is_err());
    }
}
