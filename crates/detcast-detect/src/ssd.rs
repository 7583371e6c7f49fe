// detcast-detect/src/ssd.rs
use crate::{filter_detections, DetectError, Detection, Detector, Result};
use detcast_camera::RgbFrame;
use detcast_preprocess::Preprocessor;
use std::path::Path;
use tract_onnx::prelude::*;

/// Model input geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorConfig {
    input_width: u32,
    input_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        // SSD MobileNet v1/v2 family
        Self {
            input_width: 300,
            input_height: 300,
        }
    }
}

impl DetectorConfig {
    /// Set the model input width in pixels.
    pub fn with_input_width(mut self, input_width: u32) -> Self {
        self.input_width = input_width;
        self
    }

    /// Set the model input height in pixels.
    pub fn with_input_height(mut self, input_height: u32) -> Self {
        self.input_height = input_height;
        self
    }

    pub fn input_width(&self) -> u32 {
        self.input_width
    }

    pub fn input_height(&self) -> u32 {
        self.input_height
    }
}

/// Which model output holds which SSD head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub boxes: usize,
    pub classes: usize,
    pub scores: usize,
    pub count: Option<usize>,
}

impl OutputLayout {
    /// Match outputs by name (`detection_boxes`, `detection_classes`, …),
    /// falling back to the TFLite order boxes, classes, scores, count.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.len() < 3 {
            return Err(DetectError::InvalidOutputs(names.len()));
        }

        let lowered: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();
        let find = |keys: &[&str]| {
            lowered
                .iter()
                .position(|name| keys.iter().any(|key| name.contains(key)))
        };

        if let (Some(boxes), Some(classes), Some(scores)) =
            (find(&["box"]), find(&["class"]), find(&["score"]))
        {
            if boxes != classes && boxes != scores && classes != scores {
                let count = find(&["num", "count"])
                    .filter(|ix| ![boxes, classes, scores].contains(ix));
                return Ok(Self {
                    boxes,
                    classes,
                    scores,
                    count,
                });
            }
        }

        Ok(Self {
            boxes: 0,
            classes: 1,
            scores: 2,
            count: (names.len() > 3).then_some(3),
        })
    }
}

/// Tract-powered SSD detector.
pub struct TractSsd {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    layout: OutputLayout,
    preprocessor: Preprocessor,
}

impl TractSsd {
    /// Load and optimize the ONNX model, preparing it for inference.
    ///
    /// Input 0 is pinned to `u8[1, H, W, 3]`, the quantized SSD input.
    pub fn load(model_path: impl AsRef<Path>, config: &DetectorConfig) -> Result<Self> {
        let (w, h) = (config.input_width() as usize, config.input_height() as usize);
        let model = tract_onnx::onnx()
            .model_for_path(model_path.as_ref())?
            .with_input_fact(0, InferenceFact::dt_shape(u8::datum_type(), tvec![1, h, w, 3]))?
            .into_optimized()?;

        let names = model
            .output_outlets()?
            .iter()
            .map(|outlet| {
                model
                    .outlet_label(*outlet)
                    .map(str::to_owned)
                    .unwrap_or_else(|| model.node(outlet.node).name.clone())
            })
            .collect::<Vec<_>>();
        let layout = OutputLayout::from_names(&names)?;
        log::info!(
            "loaded {:?} ({}x{} input), outputs {:?} → {:?}",
            model_path.as_ref(),
            w,
            h,
            names,
            layout
        );

        Ok(Self {
            model: model.into_runnable()?,
            layout,
            preprocessor: Preprocessor::new(config.input_width(), config.input_height()),
        })
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    fn decode(&self, outputs: &TVec<TValue>, threshold: f32) -> Result<Vec<Detection>> {
        let output = |ix: usize| outputs.get(ix).ok_or(DetectError::MissingOutput(ix));

        let boxes = output(self.layout.boxes)?.cast_to::<f32>()?;
        let classes = output(self.layout.classes)?.cast_to::<f32>()?;
        let scores = output(self.layout.scores)?.cast_to::<f32>()?;
        let (boxes, classes, scores) = (
            boxes.as_slice::<f32>()?,
            classes.as_slice::<f32>()?,
            scores.as_slice::<f32>()?,
        );
        if boxes.len() != scores.len() * 4 {
            return Err(DetectError::InvalidOutputShape {
                boxes: boxes.len(),
                scores: scores.len(),
            });
        }

        let count = match self.layout.count {
            Some(ix) => output(ix)?
                .cast_to::<f32>()?
                .as_slice::<f32>()?
                .first()
                .map(|&n| n.max(0.0) as usize),
            None => None,
        }
        .unwrap_or(scores.len());

        Ok(filter_detections(boxes, classes, scores, count, threshold))
    }
}

impl Detector for TractSsd {
    fn detect(&self, frame: &RgbFrame, threshold: f32) -> Result<Vec<Detection>> {
        let input = self.preprocessor.run(frame)?;
        let tensor = Tensor::from_shape::<u8>(
            &[1, input.height as usize, input.width as usize, 3],
            &input.data,
        )?;

        let outputs = self.model.run(tvec![tensor.into()])?;
        let dets = self.decode(&outputs, threshold)?;
        log::trace!("{} detection(s) at threshold {threshold}", dets.len());
        Ok(dets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_by_name() {
        // ONNX model zoo ssd_mobilenet_v1 ordering
        let names = ["num_detections", "detection_boxes", "detection_scores", "detection_classes"];
        let layout = OutputLayout::from_names(&names).unwrap();
        assert_eq!(
            layout,
            OutputLayout {
                boxes: 1,
                classes: 3,
                scores: 2,
                count: Some(0)
            }
        );
    }

    #[test]
    fn layout_falls_back_to_tflite_order() {
        let names = ["StatefulPartitionedCall:3", "StatefulPartitionedCall:1", "StatefulPartitionedCall:2", "StatefulPartitionedCall:0"];
        let layout = OutputLayout::from_names(&names).unwrap();
        assert_eq!(
            layout,
            OutputLayout {
                boxes: 0,
                classes: 1,
                scores: 2,
                count: Some(3)
            }
        );
    }

    #[test]
    fn layout_without_count_head() {
        let layout = OutputLayout::from_names(&["a", "b", "c"]).unwrap();
        assert_eq!(layout.count, None);
    }

    #[test]
    fn layout_needs_three_outputs() {
        assert!(matches!(
            OutputLayout::from_names(&["boxes", "scores"]),
            Err(DetectError::InvalidOutputs(2))
        ));
    }

    #[test]
    fn config_builders() {
        let config = DetectorConfig::default().with_input_width(320).with_input_height(240);
        assert_eq!((config.input_width(), config.input_height()), (320, 240));
    }
}
