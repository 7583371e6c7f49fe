// examples/visualize.rs
// ------------------------------------------------------------
// Visual smoke-test: run the SSD model on a still image, draw the
// detections and write the annotated JPEG next to it.
// cargo run -p detcast-annotate --example visualize -- <model> <labels> <image>
// ------------------------------------------------------------
use anyhow::{Context, Result};
use detcast_annotate::{Annotator, AnnotatorConfig};
use detcast_camera::RgbFrame;
use detcast_detect::{Detector, DetectorConfig, LabelTable, TractSsd};
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: visualize <model.onnx> <labels.txt> <image.jpg>");
        std::process::exit(1);
    }
    let (model_path, labels_path, image_path) = (&args[1], &args[2], Path::new(&args[3]));

    let labels = LabelTable::load(labels_path)?;
    let detector = TractSsd::load(model_path, &DetectorConfig::default())
        .with_context(|| format!("loading {model_path}"))?;

    let rgb = image::open(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?
        .to_rgb8();
    let (w, h) = rgb.dimensions();
    let frame = RgbFrame::new(w, h, rgb.into_raw())?;

    let started = Instant::now();
    let detections = detector.detect(&frame, 0.4)?;
    let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;

    for d in &detections {
        println!(
            "{:>14} {:.2}  [{:.3} {:.3} {:.3} {:.3}]",
            labels.resolve(d.class_id),
            d.score,
            d.bbox.ymin,
            d.bbox.xmin,
            d.bbox.ymax,
            d.bbox.xmax
        );
    }

    let annotator = Annotator::new(AnnotatorConfig::default().with_jpeg_quality(95));
    let out = annotator.annotate(frame, &detections, &labels, elapsed_ms)?;
    let out_path = image_path.with_extension("annotated.jpg");
    std::fs::write(&out_path, out.jpeg())?;
    println!("{} detection(s) in {elapsed_ms:.1}ms → {}", detections.len(), out_path.display());
    Ok(())
}
