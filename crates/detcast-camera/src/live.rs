// detcast-camera/src/live.rs
use crate::{CameraConfig, CameraError, FrameSource, Result, RgbFrame};
use gst::prelude::*;
use std::time::Duration;

// longest we wait on the appsink before reporting a stalled camera
const PULL_TIMEOUT: Duration = Duration::from_secs(2);

/// Camera handle – owns the pipeline and *appsink*.
///
/// The pipeline is put back to `Null` on drop, which releases the sensor.
pub struct Camera {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
}

impl Camera {
    /// Build and *Playing* a capture pipeline that delivers RGB frames.
    ///
    /// ```no_run
    /// use detcast_camera::{Camera, CameraConfig, FrameSource};
    /// let mut cam = Camera::open(&CameraConfig::default()).unwrap();
    /// let frame = cam.next_frame().unwrap();
    /// println!("{}×{}", frame.width, frame.height);
    /// ```
    pub fn open(config: &CameraConfig) -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;

        let src = match config.device() {
            Some(device) => format!("v4l2src device={device}"),
            // Pi (libcamera) stack
            None if gst::ElementFactory::find("libcamerasrc").is_some() => "libcamerasrc".to_string(),
            // PC webcam
            None => "v4l2src device=/dev/video0".to_string(),
        };

        // leaky queue + drop=true: a slow consumer only ever sees the newest frame
        let pipe_str = format!(
            "{src} ! videoconvert ! videoscale \
            ! video/x-raw,format=RGB,width={w},height={h},framerate={f}/1 \
            ! queue leaky=2 max-size-buffers=2 \
            ! appsink name=sink sync=false max-buffers=1 drop=true",
            src = src,
            w = config.width(),
            h = config.height(),
            f = config.fps()
        );

        let pipeline = gst::parse::launch(&pipe_str)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::NotPipeline)?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(CameraError::AppSinkNotFound)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::AppSinkDowncastFailed)?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(CameraError::StateChange)?;

        log::info!("camera pipeline playing: {pipe_str}");
        Ok(Self { pipeline, appsink })
    }

    /// Convert a `gst::Sample` into a packed [`RgbFrame`].
    fn sample_to_frame(sample: gst::Sample) -> Result<RgbFrame> {
        let buffer = sample.buffer().ok_or(CameraError::MissingBuffer)?;
        let caps = sample.caps().ok_or(CameraError::MissingCaps)?;
        let s = caps.structure(0).ok_or(CameraError::MissingStructure)?;
        let width = s
            .get::<i32>("width")
            .map_err(|e| CameraError::FieldError(e.to_string()))? as u32;
        let height = s
            .get::<i32>("height")
            .map_err(|e| CameraError::FieldError(e.to_string()))? as u32;

        let pts = buffer
            .pts()
            .map(|t| Duration::from_nanos(t.nseconds()))
            .unwrap_or(Duration::ZERO);

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::BufferMap(e.to_string()))?;
        let bytes = map.as_slice();

        // GStreamer pads RGB rows to 4 bytes; repack when the width needs it
        let row = width as usize * 3;
        let stride = if height == 0 { row } else { bytes.len() / height as usize };
        if stride < row {
            return Err(CameraError::FrameSize {
                width,
                height,
                expected: row * height as usize,
                actual: bytes.len(),
            });
        }
        let data = if stride == row {
            bytes[..row * height as usize].to_vec()
        } else {
            let mut packed = Vec::with_capacity(row * height as usize);
            for line in bytes.chunks(stride).take(height as usize) {
                packed.extend_from_slice(&line[..row]);
            }
            packed
        };
        drop(map);

        Ok(RgbFrame::new(width, height, data)?.with_pts(pts))
    }
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<RgbFrame> {
        let timeout = gst::ClockTime::from_mseconds(PULL_TIMEOUT.as_millis() as u64);
        match self.appsink.try_pull_sample(timeout) {
            Some(sample) => Self::sample_to_frame(sample),
            None if self.appsink.is_eos() => Err(CameraError::EndOfStream),
            None => Err(CameraError::Timeout(PULL_TIMEOUT)),
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
        log::info!("camera pipeline stopped");
    }
}

// ---------------------------------------------------------------------------
// Hardware test (cargo test --features gstreamer -- --ignored)
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore]
    fn capture_one() {
        let config = CameraConfig::default().with_width(640).with_height(480);
        let mut cam = Camera::open(&config).expect("create");
        let frame = cam.next_frame().expect("frame");
        println!("Received {}x{} frame, {} bytes", frame.width, frame.height, frame.data.len());
        assert_eq!(frame.width, 640);
        assert_eq!(frame.data.len(), 640 * 480 * 3);
    }
}
