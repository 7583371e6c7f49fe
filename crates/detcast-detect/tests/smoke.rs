use detcast_camera::RgbFrame;
use detcast_detect::{Detector, DetectorConfig, TractSsd};

// Needs a real SSD export, e.g. the ONNX model zoo ssd_mobilenet_v1:
//   DETCAST_MODEL=models/ssd_mobilenet_v1.onnx cargo test -- --ignored
#[test]
#[ignore]
fn ssd_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let manifest = std::env::var("CARGO_MANIFEST_DIR")?;
    let default = format!("{}/../../models/ssd_mobilenet_v1.onnx", manifest);
    let model = std::env::var("DETCAST_MODEL").unwrap_or(default);
    let det = TractSsd::load(&model, &DetectorConfig::default())?;

    // Blank 512x512 frame → nothing confident
    let frame = RgbFrame::solid(512, 512, [0, 0, 0]);
    let out = det.detect(&frame, 0.9)?;
    assert!(out.is_empty());
    Ok(())
}
