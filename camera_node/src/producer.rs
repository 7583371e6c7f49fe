//! Capture → detect → annotate → publish, one frame at a time.

use detcast_annotate::{AnnotateError, AnnotatedFrame, Annotator};
use detcast_camera::{CameraError, FrameSource};
use detcast_detect::{Detection, Detector, LabelTable};
use detcast_relay::Relay;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const STATS_EVERY: u64 = 300;

/// Failures that cost the producer one frame. Inference failures are not
/// listed: those frames still go out, unannotated.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CameraError),

    #[error("Encoding failed, frame dropped: {0}")]
    Encode(#[from] AnnotateError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub captured: u64,
    pub published: u64,
    pub capture_failures: u64,
    pub inference_failures: u64,
    pub encode_failures: u64,
    /// Capture timestamp of the newest frame pulled from the source.
    pub last_pts: Duration,
}

/// Owns the frame source; dropping the producer releases the camera.
pub struct Producer<S, D> {
    source: S,
    detector: D,
    annotator: Annotator,
    labels: Arc<LabelTable>,
    relay: Arc<Relay<AnnotatedFrame>>,
    threshold: f32,
    backoff: Duration,
    stats: ProducerStats,
    warned: HashSet<u32>,
}

impl<S: FrameSource, D: Detector> Producer<S, D> {
    pub fn new(
        source: S,
        detector: D,
        annotator: Annotator,
        labels: Arc<LabelTable>,
        relay: Arc<Relay<AnnotatedFrame>>,
        threshold: f32,
    ) -> Self {
        Self {
            source,
            detector,
            annotator,
            labels,
            relay,
            threshold,
            backoff: Duration::from_millis(100),
            stats: ProducerStats::default(),
            warned: HashSet::new(),
        }
    }

    /// Pause after a failed capture before trying again.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    /// One pipeline iteration. Returns the sequence number of the
    /// published frame.
    pub fn step(&mut self) -> Result<u64, ProducerError> {
        let frame = self.source.next_frame().map_err(|e| {
            self.stats.capture_failures += 1;
            e
        })?;
        self.stats.captured += 1;
        let pts = frame.pts;
        self.stats.last_pts = pts;

        let started = Instant::now();
        let detections = self.detector.detect(&frame, self.threshold);
        let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;

        let encoded = match detections {
            Ok(dets) => {
                log::trace!("frame @{pts:?}: {} detection(s) in {elapsed_ms:.1}ms", dets.len());
                self.warn_unknown(&dets);
                self.annotator.annotate(frame, &dets, &self.labels, elapsed_ms)
            }
            Err(e) => {
                self.stats.inference_failures += 1;
                log::warn!("inference failed on frame @{pts:?}, publishing it unannotated: {e}");
                self.annotator.encode_plain(frame, elapsed_ms)
            }
        };
        let annotated = encoded.map_err(|e| {
            self.stats.encode_failures += 1;
            e
        })?;

        let seq = self.relay.publish(annotated);
        self.stats.published += 1;
        Ok(seq)
    }

    /// Loop until `running` goes false. The frame source is released when
    /// this returns.
    pub fn run(mut self, running: &AtomicBool) -> ProducerStats {
        log::info!("producer started (threshold {:.2})", self.threshold);
        while running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(_) => {
                    if self.stats.published % STATS_EVERY == 0 {
                        log::debug!("producer: {:?}", self.stats);
                    }
                }
                Err(ProducerError::Capture(e)) => {
                    log::warn!("capture failed, retrying in {:?}: {e}", self.backoff);
                    std::thread::sleep(self.backoff);
                }
                Err(e) => log::warn!("{e}"),
            }
        }
        log::info!(
            "producer stopped: {} captured, {} published",
            self.stats.captured,
            self.stats.published
        );
        self.stats
    }

    fn warn_unknown(&mut self, detections: &[Detection]) {
        for det in detections {
            if !self.labels.contains(det.class_id) && self.warned.insert(det.class_id) {
                log::warn!("class id {} has no label, drawing #{}", det.class_id, det.class_id);
            }
        }
    }
}
