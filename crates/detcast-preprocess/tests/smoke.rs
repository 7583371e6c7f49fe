use detcast_camera::RgbFrame;
use detcast_preprocess::{PreprocessError, Preprocessor};

#[test]
fn cpu_smoke() {
    // Flat grey 640×480
    let frame = RgbFrame::solid(640, 480, [128, 128, 128]);

    let pp = Preprocessor::new(300, 300);
    let out = pp.run(&frame).unwrap();
    assert_eq!((out.width, out.height), (300, 300));
    assert_eq!(out.data.len(), 300 * 300 * 3);
    // a flat image stays (almost) flat after resampling
    assert!(out.data.iter().all(|&v| (126..=130).contains(&v)));
}

#[test]
fn same_size_is_passthrough() {
    let frame = RgbFrame::solid(300, 300, [10, 20, 30]);
    let out = Preprocessor::new(300, 300).run(&frame).unwrap();
    assert_eq!(out.data, frame.data);
}

#[test]
fn empty_frame_is_rejected() {
    let frame = RgbFrame::new(0, 0, Vec::new()).unwrap();
    match Preprocessor::new(300, 300).run(&frame) {
        Err(PreprocessError::EmptyFrame(0, 0)) => {}
        other => panic!("expected EmptyFrame, got {other:?}"),
    }
}
