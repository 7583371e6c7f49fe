// detcast-camera/src/replay.rs
use crate::{CameraError, FrameSource, Result, RgbFrame};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Plays a set of image files back as if they came from a camera.
///
/// Files are matched with a glob, sorted by path, and cycled forever. With a
/// non-zero `fps` each `next_frame` sleeps until the next frame is due, so the
/// pipeline sees a realistic capture rate.
pub struct ReplaySource {
    paths: Vec<PathBuf>,
    next: usize,
    interval: Option<Duration>,
    last: Option<Instant>,
    started: Instant,
}

impl ReplaySource {
    pub fn open(pattern: &str, fps: u32) -> Result<Self> {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::NoFrames(pattern.to_string()));
        }

        let interval = (fps > 0).then(|| Duration::from_secs(1) / fps);
        log::info!("replaying {} file(s) from {pattern:?}", paths.len());

        Ok(Self {
            paths,
            next: 0,
            interval,
            last: None,
            started: Instant::now(),
        })
    }

    /// Number of files in the replay loop.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let due = last + interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last = Some(Instant::now());
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<RgbFrame> {
        self.pace();

        let path = &self.paths[self.next % self.paths.len()];
        self.next = self.next.wrapping_add(1);

        let image = image::open(path)
            .map_err(|source| CameraError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();

        Ok(RgbFrame::new(width, height, image.into_raw())?.with_pts(self.started.elapsed()))
    }
}
