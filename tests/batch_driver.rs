use anyhow::{anyhow, Result};
use image::RgbImage;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use reel_banner::batch::NoopObserver;
use reel_banner::media::{EncodeRequest, FilterGraph, MediaTools};
use reel_banner::sample::{FrameIter, FrameSampler};
use reel_banner::{
    BatchDriver, Envelope, FixedEnvelopeDetector, FontSet, ItemError, JobDatabase, JobStatus,
    LayoutPlan, OverlayCompositor, VideoDimensions, VideoFrame,
};

const DIMS: VideoDimensions = VideoDimensions {
    width: 216,
    height: 384,
};

#[derive(Debug, Clone)]
struct EncodeCall {
    request: EncodeRequest,
    aux_existed: bool,
}

#[derive(Clone, Default)]
struct FakeMedia {
    calls: Arc<Mutex<Vec<EncodeCall>>>,
    /// Raised after every encode, to simulate Ctrl-C mid-batch.
    cancel_on_encode: Option<Arc<AtomicBool>>,
}

impl FakeMedia {
    fn calls(&self) -> Vec<EncodeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl MediaTools for FakeMedia {
    fn probe(&self, path: &Path) -> Result<VideoDimensions> {
        if file_name(path).contains("corrupt") {
            return Err(anyhow!("moov atom not found"));
        }
        Ok(DIMS)
    }

    fn encode(&self, request: &EncodeRequest) -> Result<()> {
        let aux_existed = request.aux_inputs.iter().all(|a| a.path.is_file());
        self.calls.lock().unwrap().push(EncodeCall {
            request: request.clone(),
            aux_existed,
        });
        if let Some(flag) = &self.cancel_on_encode {
            flag.store(true, Ordering::SeqCst);
        }
        if file_name(&request.input).contains("bad") {
            return Err(anyhow!("Conversion failed!"));
        }
        std::fs::write(&request.output, b"encoded")?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

struct BlankSampler;

impl FrameSampler for BlankSampler {
    fn name(&self) -> &'static str {
        "blank"
    }

    fn sample<'a>(
        &'a self,
        _path: &'a Path,
        dims: VideoDimensions,
        timestamps_ms: &'a [u64],
    ) -> Result<FrameIter<'a>> {
        Ok(Box::new(timestamps_ms.iter().map(move |&ts| {
            VideoFrame::new(RgbImage::new(dims.width, dims.height), ts)
        })))
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(config: Value, reels: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::create_dir_all(dir.path().join("downloads/job-1")).unwrap();
        let db = json!({
            "job-1": {
                "id": "job-1",
                "url": "https://example.invalid/@someone",
                "config": config,
                "status": "pending",
                "reels": reels
            }
        });
        std::fs::write(
            dir.path().join("data/jobs.json"),
            serde_json::to_vec_pretty(&db).unwrap(),
        )
        .unwrap();
        Self { dir }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("data/jobs.json")
    }

    fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    fn job_dir(&self) -> PathBuf {
        self.downloads().join("job-1")
    }

    fn touch(&self, name: &str) {
        std::fs::write(self.job_dir().join(name), b"video").unwrap();
    }

    fn driver(&self, media: &FakeMedia) -> BatchDriver {
        BatchDriver::new(
            Box::new(media.clone()),
            Box::new(BlankSampler),
            Box::new(FixedEnvelopeDetector::always(Envelope::new(40, 130))),
            OverlayCompositor::new(FontSet::empty(), None),
            self.downloads(),
        )
    }

    fn raw_db(&self) -> Value {
        serde_json::from_slice(&std::fs::read(self.db_path()).unwrap()).unwrap()
    }

    fn job_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.job_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn design() -> Value {
    json!({ "mode": "design", "showHeadline": "true", "autoDetectPosition": "true" })
}

#[test]
fn design_mode_processes_approved_reels() {
    let fx = Fixture::new(
        design(),
        json!([
            { "id": "r1", "status": "approved", "local_video_path": "r1.mp4", "views": 10 },
            { "id": "r2", "status": "rejected", "local_video_path": "r2.mp4" },
            { "id": "r3", "status": "approved" }
        ]),
    );
    fx.touch("r1.mp4");
    fx.touch("r2.mp4");
    fx.touch("r3.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();

    assert_eq!(summary.processed, vec!["r1", "r3"]);
    assert!(summary.failed.is_empty());
    assert!(!summary.cancelled);

    let calls = media.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert_eq!(call.request.filter_graph, FilterGraph::full_frame_overlay());
        assert_eq!(call.request.aux_inputs.len(), 1);
        assert!(call.request.aux_inputs[0].loop_image);
        assert!(call.aux_existed, "overlay must exist while encoding");
        assert!(call.request.aux_inputs[0].path.starts_with(fx.job_dir()));
    }
    assert_eq!(calls[0].request.input, fx.job_dir().join("r1.mp4"));
    assert_eq!(calls[0].request.output, fx.job_dir().join("processed_r1.mp4"));

    assert_eq!(
        fx.job_dir_entries(),
        vec!["processed_r1.mp4", "processed_r3.mp4", "r1.mp4", "r2.mp4", "r3.mp4"]
    );

    let reloaded = JobDatabase::load(fx.db_path()).unwrap();
    let job = reloaded.job("job-1").unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.reels[0].processed_path.as_deref(), Some("processed_r1.mp4"));
    assert_eq!(
        job.reels[0].layout,
        Some(LayoutPlan {
            y: 0,
            h: 61,
            correction: 0,
            width: 216,
            height: 384
        })
    );
    assert!(job.reels[1].processed_path.is_none());

    let raw = fx.raw_db();
    assert_eq!(raw["job-1"]["url"], "https://example.invalid/@someone");
    assert_eq!(raw["job-1"]["reels"][0]["views"], 10);
    assert_eq!(raw["job-1"]["status"], "completed");
}

#[test]
fn vertical_correction_is_recorded() {
    let fx = Fixture::new(
        json!({ "mode": "design", "verticalCorrection": "-12" }),
        json!([{ "id": "r1", "status": "approved", "local_video_path": "r1.mp4" }]),
    );
    fx.touch("r1.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();

    let layout = db.job("job-1").unwrap().reels[0].layout.unwrap();
    assert_eq!((layout.y, layout.h, layout.correction), (-12, 61, -12));
}

#[test]
fn failing_items_do_not_abort_the_batch() {
    let fx = Fixture::new(
        design(),
        json!([
            { "id": "nofile", "status": "approved" },
            { "id": "gone", "status": "approved", "local_video_path": "gone.mp4" },
            { "id": "corrupt", "status": "approved", "local_video_path": "corrupt.mp4" },
            { "id": "bad", "status": "approved", "local_video_path": "bad.mp4" },
            { "id": "ok", "status": "approved", "local_video_path": "ok.mp4" }
        ]),
    );
    fx.touch("corrupt.mp4");
    fx.touch("bad.mp4");
    fx.touch("ok.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();

    assert_eq!(summary.processed, vec!["ok"]);
    let failed: Vec<(&str, &ItemError)> =
        summary.failed.iter().map(|(id, e)| (id.as_str(), e)).collect();
    assert_eq!(failed.len(), 4);
    assert!(matches!(failed[0], ("nofile", ItemError::NoLocalFile)));
    assert!(matches!(failed[1], ("gone", ItemError::InputMissing(_))));
    assert!(matches!(failed[2], ("corrupt", ItemError::Probe(_))));
    assert!(matches!(failed[3], ("bad", ItemError::Encode(_))));

    // The failed encode's temporary overlay is gone too.
    assert!(!fx.job_dir_entries().iter().any(|n| n.starts_with("temp_overlay")));

    let job = JobDatabase::load(fx.db_path()).unwrap();
    let job = job.job("job-1").unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.reels[3].processed_path.is_none());
    assert_eq!(job.reels[4].processed_path.as_deref(), Some("processed_ok.mp4"));
}

#[test]
fn terminal_reels_are_skipped_unless_reprocessing() {
    let reels = json!([{
        "id": "r1",
        "status": "approved",
        "local_video_path": "r1.mp4",
        "processed_path": "processed_r1.mp4"
    }]);
    let fx = Fixture::new(design(), reels);
    fx.touch("r1.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();
    assert_eq!(summary.skipped_terminal, 1);
    assert!(summary.processed.is_empty());
    assert!(media.calls().is_empty());

    let summary = fx
        .driver(&media)
        .with_reprocess(true)
        .run(&mut db, "job-1", &mut NoopObserver)
        .unwrap();
    assert_eq!(summary.skipped_terminal, 0);
    assert_eq!(summary.processed, vec!["r1"]);
    assert_eq!(media.calls().len(), 1);
}

#[test]
fn cancelled_run_is_not_marked_completed() {
    let fx = Fixture::new(
        design(),
        json!([
            { "id": "r1", "status": "approved", "local_video_path": "r1.mp4" },
            { "id": "r2", "status": "approved", "local_video_path": "r2.mp4" }
        ]),
    );
    fx.touch("r1.mp4");
    fx.touch("r2.mp4");

    let cancel = Arc::new(AtomicBool::new(false));
    let media = FakeMedia {
        cancel_on_encode: Some(Arc::clone(&cancel)),
        ..FakeMedia::default()
    };
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx
        .driver(&media)
        .with_cancel_flag(cancel)
        .run(&mut db, "job-1", &mut NoopObserver)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, vec!["r1"]);
    assert_eq!(media.calls().len(), 1);

    let raw = fx.raw_db();
    assert_eq!(raw["job-1"]["status"], "pending");
    assert_eq!(raw["job-1"]["reels"][0]["processed_path"], "processed_r1.mp4");
    assert!(raw["job-1"]["reels"][1].get("processed_path").is_none());
}

#[test]
fn upload_mode_scales_the_uploaded_header() {
    let fx = Fixture::new(
        json!({ "mode": "upload" }),
        json!([{ "id": "r1", "status": "approved", "local_video_path": "r1.mp4" }]),
    );
    fx.touch("r1.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();
    assert!(matches!(summary.failed[0].1, ItemError::OverlayMissing(_)));
    assert!(media.calls().is_empty());

    image::RgbaImage::new(10, 4)
        .save(fx.job_dir().join("header_overlay.png"))
        .unwrap();
    let summary = fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();
    assert_eq!(summary.processed, vec!["r1"]);

    let calls = media.calls();
    let request = &calls[0].request;
    // Full band: y snaps to 0, height capped at 16% of 384.
    assert_eq!(request.filter_graph, FilterGraph::static_header(216, 61, 0));
    assert_eq!(request.aux_inputs[0].path, fx.job_dir().join("header_overlay.png"));
    assert!(db.job("job-1").unwrap().reels[0].layout.is_none());
}

#[test]
fn upload_mode_without_detection_uses_fixed_band() {
    let fx = Fixture::new(
        json!({ "mode": "upload", "autoDetectPosition": false }),
        json!([{ "id": "r1", "status": "approved", "local_video_path": "r1.mp4" }]),
    );
    fx.touch("r1.mp4");
    image::RgbaImage::new(10, 4)
        .save(fx.job_dir().join("header_overlay.png"))
        .unwrap();

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    fx.driver(&media).run(&mut db, "job-1", &mut NoopObserver).unwrap();
    assert_eq!(
        media.calls()[0].request.filter_graph,
        FilterGraph::static_header(216, 58, 0)
    );
}

#[test]
fn missing_input_falls_back_to_source_dir() {
    let fx = Fixture::new(
        design(),
        json!([{ "id": "r1", "status": "approved", "local_video_path": "r1.mp4" }]),
    );
    let source = fx.dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("r1.mp4"), b"video").unwrap();

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let summary = fx
        .driver(&media)
        .with_fallback_source_dir(Some(source.clone()))
        .run(&mut db, "job-1", &mut NoopObserver)
        .unwrap();

    assert_eq!(summary.processed, vec!["r1"]);
    let calls = media.calls();
    assert_eq!(calls[0].request.input, source.join("r1.mp4"));
    assert_eq!(calls[0].request.output, fx.job_dir().join("processed_r1.mp4"));
}

#[test]
fn invalid_config_and_unknown_job_are_fatal() {
    let fx = Fixture::new(
        json!({ "mode": "design", "showHeadline": "yes" }),
        json!([{ "id": "r1", "status": "approved", "local_video_path": "r1.mp4" }]),
    );
    fx.touch("r1.mp4");

    let media = FakeMedia::default();
    let mut db = JobDatabase::load(fx.db_path()).unwrap();
    let err = fx
        .driver(&media)
        .run(&mut db, "job-1", &mut NoopObserver)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("showHeadline"));

    assert!(fx.driver(&media).run(&mut db, "job-2", &mut NoopObserver).is_err());
    assert!(media.calls().is_empty());
    assert_eq!(fx.raw_db()["job-1"]["status"], "pending");
}
