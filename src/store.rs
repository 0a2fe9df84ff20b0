//! Job database.
//!
//! A single JSON object keyed by job id. The file is shared with the
//! ingestion and preview tools, so every field this crate does not model is
//! carried through untouched. Writes go to a temp file in the same directory
//! and are renamed over the original.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Resolved banner geometry, stored on the reel under `layout`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutPlan {
    pub y: i32,
    pub h: i32,
    pub correction: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReelStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_video_path: Option<String>,
    #[serde(default)]
    pub status: ReelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reel {
    pub fn is_approved(&self) -> bool {
        self.status == ReelStatus::Approved
    }

    /// A processed reel has an output on record.
    pub fn is_terminal(&self) -> bool {
        self.processed_path.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Branding form values, validated by `BrandingConfig`.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub reels: Vec<Reel>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct JobDatabase {
    path: PathBuf,
    jobs: BTreeMap<String, Job>,
}

impl JobDatabase {
    /// Read the whole database. A missing or malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("open job database {}", path.display()))?;
        let jobs: BTreeMap<String, Job> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse job database {}", path.display()))?;
        log::debug!("loaded {} job(s) from {}", jobs.len(), path.display());
        Ok(Self { path, jobs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job(&self, id: &str) -> Result<&Job> {
        self.jobs
            .get(id)
            .ok_or_else(|| anyhow!("job {} not found in {}", id, self.path.display()))
    }

    pub fn job_mut(&mut self, id: &str) -> Result<&mut Job> {
        let path = &self.path;
        self.jobs
            .get_mut(id)
            .ok_or_else(|| anyhow!("job {} not found in {}", id, path.display()))
    }

    /// Write the database atomically.
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &self.jobs).context("serialize job database")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().context("sync job database")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replace job database {}", self.path.display()))?;
        Ok(())
    }
}
