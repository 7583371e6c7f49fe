// -----------------------------------------------------------------------------
// detcast-annotate
//
// Draws detection boxes, labels and the inference latency onto a frame and
// encodes the result as JPEG, ready to go out on the MJPEG stream.
// -----------------------------------------------------------------------------

pub mod font;

use bytes::Bytes;
use detcast_camera::RgbFrame;
use detcast_detect::{BoundingBox, Detection, LabelTable};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use thiserror::Error;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Frame buffer of {len} bytes does not match {width}x{height} RGB")]
    InvalidFrame { width: u32, height: u32, len: usize },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AnnotateError>;

/// A JPEG-encoded frame. Cloning is cheap; every stream client shares the
/// same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedFrame {
    jpeg: Bytes,
    width: u32,
    height: u32,
}

impl AnnotatedFrame {
    pub fn new(jpeg: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self { jpeg: jpeg.into(), width, height }
    }

    pub fn jpeg(&self) -> &Bytes {
        &self.jpeg
    }

    pub fn into_jpeg(self) -> Bytes {
        self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Integer pixel rectangle, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub ymin: i32,
    pub xmin: i32,
    pub ymax: i32,
    pub xmax: i32,
}

/// Scale a normalised box to a `width`×`height` frame. Coordinates are
/// truncated, then clamped into the frame; `min <= max` always holds.
pub fn to_pixel_box(bbox: &BoundingBox, width: u32, height: u32) -> PixelBox {
    let scale = |v: f32, extent: u32| {
        let max = extent.saturating_sub(1) as i32;
        ((v * extent as f32) as i32).clamp(0, max)
    };
    let (y0, y1) = (scale(bbox.ymin, height), scale(bbox.ymax, height));
    let (x0, x1) = (scale(bbox.xmin, width), scale(bbox.xmax, width));
    PixelBox {
        ymin: y0.min(y1),
        xmin: x0.min(x1),
        ymax: y0.max(y1),
        xmax: x0.max(x1),
    }
}

#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    jpeg_quality: u8,
    text_scale: u32,
    box_thickness: u32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85, text_scale: 2, box_thickness: 2 }
    }
}

impl AnnotatorConfig {
    /// Clamped to 1..=100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_text_scale(mut self, scale: u32) -> Self {
        self.text_scale = scale.max(1);
        self
    }

    pub fn with_box_thickness(mut self, px: u32) -> Self {
        self.box_thickness = px.max(1);
        self
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn text_scale(&self) -> u32 {
        self.text_scale
    }

    pub fn box_thickness(&self) -> u32 {
        self.box_thickness
    }
}

#[derive(Debug, Clone, Default)]
pub struct Annotator {
    config: AnnotatorConfig,
}

impl Annotator {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Draw every detection plus the latency readout, then encode.
    ///
    /// Class ids missing from `labels` are drawn with their `#<id>`
    /// placeholder; that is never an error here.
    pub fn annotate(
        &self,
        frame: RgbFrame,
        detections: &[Detection],
        labels: &LabelTable,
        elapsed_ms: f32,
    ) -> Result<AnnotatedFrame> {
        let image = self.render(frame, detections, labels, elapsed_ms)?;
        self.encode(&image)
    }

    /// Latency readout only, for frames whose inference failed.
    pub fn encode_plain(&self, frame: RgbFrame, elapsed_ms: f32) -> Result<AnnotatedFrame> {
        let mut image = into_image(frame)?;
        self.draw_latency(&mut image, elapsed_ms);
        self.encode(&image)
    }

    /// Same drawing as [`annotate`](Self::annotate) without the JPEG step.
    pub fn render(
        &self,
        frame: RgbFrame,
        detections: &[Detection],
        labels: &LabelTable,
        elapsed_ms: f32,
    ) -> Result<RgbImage> {
        let mut image = into_image(frame)?;
        let (width, height) = image.dimensions();

        for det in detections {
            let pb = to_pixel_box(&det.bbox, width, height);
            self.draw_box(&mut image, pb);
            let text = format!("{}\n{:.2}", labels.resolve(det.class_id), det.score);
            self.draw_label(&mut image, pb.xmin, pb.ymin, &text);
        }
        self.draw_latency(&mut image, elapsed_ms);
        Ok(image)
    }

    fn draw_box(&self, image: &mut RgbImage, pb: PixelBox) {
        let w = (pb.xmax - pb.xmin + 1) as u32;
        let h = (pb.ymax - pb.ymin + 1) as u32;
        // grow inwards so boxes on the frame edge stay visible
        for t in 0..self.config.box_thickness {
            let inset = t as i32;
            let (iw, ih) = (w.saturating_sub(2 * t), h.saturating_sub(2 * t));
            if iw == 0 || ih == 0 {
                break;
            }
            let rect = Rect::at(pb.xmin + inset, pb.ymin + inset).of_size(iw, ih);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, text: &str) {
        let scale = self.config.text_scale;
        let (tw, th) = font::text_size(text, scale);
        if tw > 0 && th > 0 {
            draw_filled_rect_mut(image, Rect::at(x, y).of_size(tw + scale, th), TEXT_BACKGROUND);
        }
        font::draw_text(image, x + scale as i32, y + scale as i32, text, scale, TEXT_COLOR);
    }

    fn draw_latency(&self, image: &mut RgbImage, elapsed_ms: f32) {
        self.draw_label(image, 5, 0, &format!("{elapsed_ms:.1}ms"));
    }

    fn encode(&self, image: &RgbImage) -> Result<AnnotatedFrame> {
        let (width, height) = image.dimensions();
        let mut buf = Vec::with_capacity((width * height) as usize / 4);
        JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality).encode_image(image)?;
        log::trace!("encoded {width}x{height} frame to {} bytes", buf.len());
        Ok(AnnotatedFrame::new(buf, width, height))
    }
}

fn into_image(frame: RgbFrame) -> Result<RgbImage> {
    let (width, height, len) = (frame.width, frame.height, frame.data.len());
    RgbImage::from_raw(width, height, frame.data)
        .ok_or(AnnotateError::InvalidFrame { width, height, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_box_scales_and_truncates() {
        let pb = to_pixel_box(&BoundingBox::new(0.25, 0.25, 0.75, 0.75), 512, 512);
        assert_eq!(pb, PixelBox { ymin: 128, xmin: 128, ymax: 384, xmax: 384 });

        let pb = to_pixel_box(&BoundingBox::new(0.1, 0.1, 0.2, 0.2), 15, 15);
        assert_eq!((pb.xmin, pb.xmax), (1, 3));
    }

    #[test]
    fn pixel_box_is_clamped_and_ordered() {
        let pb = to_pixel_box(&BoundingBox::new(-0.2, 1.4, 1.3, 0.5), 100, 50);
        assert_eq!(pb, PixelBox { ymin: 0, xmin: 50, ymax: 49, xmax: 99 });
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(AnnotatorConfig::default().with_jpeg_quality(0).jpeg_quality(), 1);
        assert_eq!(AnnotatorConfig::default().with_jpeg_quality(200).jpeg_quality(), 100);
    }
}
