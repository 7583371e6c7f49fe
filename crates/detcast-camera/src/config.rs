/// Configuration for camera capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    device: Option<String>,
    width: u32,
    height: u32,
    fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: 512,
            height: 512,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Pin capture to a V4L2 device node (e.g. "/dev/video0").
    ///
    /// Without a device the camera prefers libcamera and falls back to the
    /// first V4L2 node.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the capture width in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the capture height in pixels.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    /// Set the frames per second.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    // Getters
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}
