use detcast_camera::{CameraConfig, CameraError, FrameSource, ReplaySource};
use image::{Rgb, RgbImage};
use tempfile::tempdir;

fn write_png(path: &std::path::Path, width: u32, height: u32, colour: [u8; 3]) {
    RgbImage::from_pixel(width, height, Rgb(colour))
        .save(path)
        .expect("write png");
}

#[test]
fn replay_cycles_sorted_files() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("b.png"), 8, 4, [0, 255, 0]);
    write_png(&dir.path().join("a.png"), 6, 6, [255, 0, 0]);

    let pattern = format!("{}/*.png", dir.path().display());
    let mut source = ReplaySource::open(&pattern, 0).unwrap();
    assert_eq!(source.len(), 2);

    let first = source.next_frame().unwrap();
    assert_eq!((first.width, first.height), (6, 6));
    assert_eq!(&first.data[..3], &[255, 0, 0]);

    let second = source.next_frame().unwrap();
    assert_eq!((second.width, second.height), (8, 4));
    assert_eq!(second.data.len(), 8 * 4 * 3);

    // wraps around to the first file again
    let third = source.next_frame().unwrap();
    assert_eq!((third.width, third.height), (6, 6));
}

#[test]
fn replay_without_matches_is_an_error() {
    let dir = tempdir().unwrap();
    let pattern = format!("{}/*.jpg", dir.path().display());

    match ReplaySource::open(&pattern, 30) {
        Err(CameraError::NoFrames(p)) => assert_eq!(p, pattern),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("expected NoFrames"),
    }
}

#[test]
fn replay_reports_undecodable_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

    let pattern = format!("{}/*.png", dir.path().display());
    let mut source = ReplaySource::open(&pattern, 0).unwrap();
    match source.next_frame() {
        Err(CameraError::Decode { path, .. }) => assert!(path.ends_with("broken.png")),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn replay_paces_to_frame_rate() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("only.png"), 2, 2, [1, 2, 3]);

    let pattern = format!("{}/*.png", dir.path().display());
    let mut source = ReplaySource::open(&pattern, 20).unwrap();

    let start = std::time::Instant::now();
    for _ in 0..3 {
        source.next_frame().unwrap();
    }
    // first frame is immediate, the next two wait 50ms each
    assert!(start.elapsed() >= std::time::Duration::from_millis(95));
}

#[test]
fn camera_config_defaults_and_builders() {
    let config = CameraConfig::default();
    assert_eq!((config.width(), config.height(), config.fps()), (512, 512, 30));
    assert_eq!(config.device(), None);

    let config = config.with_device("/dev/video2").with_width(640).with_height(480).with_fps(15);
    assert_eq!(config.device(), Some("/dev/video2"));
    assert_eq!((config.width(), config.height(), config.fps()), (640, 480, 15));
}
