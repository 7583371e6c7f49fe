//! detcast‑preprocess – resize captured RGB frames to the detector's input size.

use detcast_camera::RgbFrame;
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Resize failed: {0}")]
    Resize(#[from] resize::Error),
    #[error("Cannot resize an empty {0}x{1} frame")]
    EmptyFrame(u32, u32),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Packed RGB8 pixels at the model's input resolution (HWC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Preprocessor {
    dst_w: u32,
    dst_h: u32,
}

impl Preprocessor {
    /// Create a pre‑processor that outputs WxH RGB8.
    pub fn new(dst_w: u32, dst_h: u32) -> Self {
        Self { dst_w, dst_h }
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.dst_w, self.dst_h)
    }

    /// CPU path – triangle filter, good enough for SSD inputs and cheap on a Pi.
    pub fn run(&self, frame: &RgbFrame) -> Result<ModelInput> {
        let w = frame.width as usize;
        let h = frame.height as usize;
        if w == 0 || h == 0 {
            return Err(PreprocessError::EmptyFrame(frame.width, frame.height));
        }

        // 1. already the right size: no resampling
        if frame.width == self.dst_w && frame.height == self.dst_h {
            return Ok(ModelInput {
                width: self.dst_w,
                height: self.dst_h,
                data: frame.data.clone(),
            });
        }

        // 2. Resize to dst size (resize crate)
        let mut dst = vec![0u8; (self.dst_w * self.dst_h * 3) as usize];
        let mut resizer = new(
            w,
            h,
            self.dst_w as usize,
            self.dst_h as usize,
            Pixel::RGB8,
            Type::Triangle,
        )?;
        resizer.resize(frame.data.as_rgb(), dst.as_rgb_mut())?;

        Ok(ModelInput {
            width: self.dst_w,
            height: self.dst_h,
            data: dst,
        })
    }
}
