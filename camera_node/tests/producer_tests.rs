use detcast_annotate::{Annotator, AnnotatorConfig};
use detcast_camera::{CameraError, FrameSource, RgbFrame};
use detcast_detect::{BoundingBox, DetectError, Detection, Detector, LabelTable};
use detcast_node::{Producer, ProducerError};
use detcast_relay::Relay;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Replays a script of capture results, then flips `running` off.
struct ScriptedSource {
    script: VecDeque<Result<RgbFrame, CameraError>>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<RgbFrame, CameraError>>, running: Arc<AtomicBool>) -> Self {
        Self {
            script: script.into(),
            running,
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> detcast_camera::Result<RgbFrame> {
        let next = self.script.pop_front().unwrap_or(Err(CameraError::EndOfStream));
        if self.script.is_empty() {
            self.running.store(false, Ordering::SeqCst);
        }
        next
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

struct FixedDetector(Vec<Detection>);

impl Detector for FixedDetector {
    fn detect(&self, _frame: &RgbFrame, threshold: f32) -> detcast_detect::Result<Vec<Detection>> {
        Ok(self.0.iter().filter(|d| d.score >= threshold).cloned().collect())
    }
}

struct BrokenDetector;

impl Detector for BrokenDetector {
    fn detect(&self, _frame: &RgbFrame, _threshold: f32) -> detcast_detect::Result<Vec<Detection>> {
        Err(DetectError::InvalidOutputs(1))
    }
}

fn frame() -> RgbFrame {
    RgbFrame::solid(64, 48, [10, 20, 30])
}

fn labels() -> Arc<LabelTable> {
    Arc::new([(0, "person")].into_iter().collect())
}

fn person(class_id: u32, score: f32) -> Detection {
    Detection {
        bbox: BoundingBox::new(0.1, 0.1, 0.6, 0.6),
        class_id,
        score,
    }
}

fn producer<D: Detector>(
    source: ScriptedSource,
    detector: D,
    relay: &Arc<Relay<detcast_annotate::AnnotatedFrame>>,
) -> Producer<ScriptedSource, D> {
    Producer::new(source, detector, Annotator::default(), labels(), relay.clone(), 0.4)
        .with_backoff(Duration::from_millis(1))
}

#[test]
fn step_publishes_annotated_jpeg() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new(vec![Ok(frame()), Ok(frame())], running);
    let mut p = producer(source, FixedDetector(vec![person(0, 0.9), person(9, 0.2)]), &relay);

    assert_eq!(p.step().unwrap(), 1);
    assert_eq!(p.step().unwrap(), 2);

    let (latest, seq) = relay.latest().unwrap();
    assert_eq!(seq, 2);
    assert_eq!((latest.width(), latest.height()), (64, 48));
    assert_eq!(&latest.jpeg()[..2], &[0xFF, 0xD8]);
    assert_eq!(p.stats().published, 2);
}

#[test]
fn inference_failure_still_publishes() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new(vec![Ok(frame())], running);
    let mut p = producer(source, BrokenDetector, &relay);

    assert_eq!(p.step().unwrap(), 1);
    let stats = p.stats();
    assert_eq!(stats.inference_failures, 1);
    assert_eq!(stats.published, 1);
    assert!(relay.latest().is_some());
}

#[test]
fn unknown_class_id_is_not_an_error() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new(vec![Ok(frame()), Ok(frame())], running);
    let mut p = producer(source, FixedDetector(vec![person(55, 0.8)]), &relay);

    assert!(p.step().is_ok());
    assert!(p.step().is_ok());
    assert_eq!(p.stats().published, 2);
}

#[test]
fn bad_frame_is_dropped_not_published() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let broken = RgbFrame {
        width: 64,
        height: 48,
        data: vec![0; 5],
        pts: Duration::ZERO,
    };
    let source = ScriptedSource::new(vec![Ok(broken)], running);
    let mut p = producer(source, FixedDetector(vec![]), &relay);

    assert!(matches!(p.step(), Err(ProducerError::Encode(_))));
    assert_eq!(p.stats().encode_failures, 1);
    assert_eq!(relay.sequence(), 0);
}

#[test]
fn stats_track_the_capture_timestamp() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let script = vec![
        Ok(frame().with_pts(Duration::from_millis(33))),
        Ok(frame().with_pts(Duration::from_millis(66))),
    ];
    let source = ScriptedSource::new(script, running);
    let mut p = producer(source, FixedDetector(vec![]), &relay);

    assert_eq!(p.stats().last_pts, Duration::ZERO);
    p.step().unwrap();
    assert_eq!(p.stats().last_pts, Duration::from_millis(33));
    p.step().unwrap();
    assert_eq!(p.stats().last_pts, Duration::from_millis(66));
}

#[test]
fn capture_failures_do_not_stop_the_loop() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let script = vec![
        Err(CameraError::Timeout(Duration::from_secs(2))),
        Ok(frame()),
        Err(CameraError::EndOfStream),
        Ok(frame()),
    ];
    let source = ScriptedSource::new(script, running.clone());
    let stats = producer(source, FixedDetector(vec![]), &relay).run(&running);

    assert_eq!(stats.captured, 2);
    assert_eq!(stats.capture_failures, 2);
    assert_eq!(stats.published, 2);
    assert_eq!(relay.sequence(), 2);
}

#[test]
fn source_is_released_when_run_returns() {
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new(vec![Ok(frame())], running.clone());
    let dropped = source.dropped.clone();
    let p = producer(source, FixedDetector(vec![]), &relay);

    assert!(!dropped.load(Ordering::SeqCst));
    p.run(&running);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn stopped_flag_means_no_capture() {
    let running = Arc::new(AtomicBool::new(false));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new(vec![Ok(frame())], running.clone());
    let stats = producer(source, FixedDetector(vec![]), &relay).run(&running);
    assert_eq!(stats.captured, 0);
    assert!(relay.latest().is_none());
}

#[test]
fn producer_runs_on_a_blocking_thread() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(Relay::new());
    let source = ScriptedSource::new((0..3).map(|_| Ok(frame())).collect(), running.clone());
    let p = Producer::new(
        source,
        FixedDetector(vec![person(0, 0.9)]),
        Annotator::new(AnnotatorConfig::default().with_jpeg_quality(50)),
        labels(),
        relay.clone(),
        0.4,
    );

    let stats = rt
        .block_on(async move { tokio::task::spawn_blocking(move || p.run(&running)).await })
        .unwrap();
    assert_eq!(stats.published, 3);
    assert_eq!(relay.sequence(), 3);
}
