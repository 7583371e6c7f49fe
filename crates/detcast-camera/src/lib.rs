// detcast-camera/src/lib.rs
// ============================================================
// Frame acquisition for detcast
// Delivers packed RGB8 frames either from a live GStreamer
// pipeline (libcamerasrc / v4l2src → appsink) or from a replay
// of image files on disk.
// ------------------------------------------------------------
// Public API:
//   * FrameSource::next_frame()   – blocking pull of one RgbFrame
//   * Camera::open(&CameraConfig) – live capture (feature "gstreamer")
//   * ReplaySource::open(glob, fps) – cycle through image files
// ------------------------------------------------------------
// Build notes
//   * The live camera needs the GStreamer dev packages, so it
//     sits behind the `gstreamer` feature. Replay is always on.
// ============================================================

//! detcast – camera capture layer
//!
//! Everything downstream of this crate (inference, annotation) works on
//! [`RgbFrame`]: a tightly packed, row-major RGB8 buffer plus its size and
//! presentation timestamp. Sources implement [`FrameSource`], whose
//! `next_frame` blocks until the hardware (or the replay clock) produces the
//! next image.
//!
//! Sources own their device. Dropping a source releases it, so holding it in
//! a scope is all the cleanup a caller has to do.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod config;
mod replay;
#[cfg(feature = "gstreamer")]
mod live;

pub use config::CameraConfig;
pub use replay::ReplaySource;
#[cfg(feature = "gstreamer")]
pub use live::Camera;

#[derive(Error, Debug)]
pub enum CameraError {
    #[cfg(feature = "gstreamer")]
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[error("Pipeline is not a gst::Pipeline")]
    NotPipeline,
    #[error("AppSink element not found")]
    AppSinkNotFound,
    #[error("AppSink element downcast failed")]
    AppSinkDowncastFailed,
    #[cfg(feature = "gstreamer")]
    #[error("Failed to set pipeline to Playing: {0}")]
    StateChange(#[source] gst::StateChangeError),
    #[error("No frame within {0:?}")]
    Timeout(Duration),
    #[error("Camera reached end of stream")]
    EndOfStream,
    #[error("Sample has no buffer")]
    MissingBuffer,
    #[error("Sample has no caps")]
    MissingCaps,
    #[error("Caps missing struct")]
    MissingStructure,
    #[error("Failed to get field value: {0}")]
    FieldError(String),
    #[error("Buffer map failed: {0}")]
    BufferMap(String),
    #[error("Frame buffer holds {actual} bytes, {width}x{height} RGB needs {expected}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid replay pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Replay pattern {0:?} matched no files")]
    NoFrames(String),
    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0} is not available in this build")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// One decoded frame, RGB8, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub pts: Duration,
}

impl RgbFrame {
    /// Wrap a packed RGB buffer, checking it matches `width × height × 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::FrameSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            pts: Duration::ZERO,
        })
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            data,
            pts: Duration::ZERO,
        }
    }

    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = pts;
        self
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }
}

/// Anything that can hand out frames one at a time.
///
/// `next_frame` may block for as long as the device needs to deliver the
/// next image; it never returns a partially written frame.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RgbFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<RgbFrame> {
        (**self).next_frame()
    }
}

/// Open the live camera, or fail with [`CameraError::Unsupported`] when the
/// crate was built without the `gstreamer` feature.
pub fn open_live(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    #[cfg(feature = "gstreamer")]
    {
        Ok(Box::new(Camera::open(config)?))
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        let _ = config;
        Err(CameraError::Unsupported("live camera capture (enable the `gstreamer` feature)"))
    }
}
