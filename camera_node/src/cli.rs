//! Command line → [`NodeConfig`].

use clap::Parser;
use detcast_annotate::AnnotatorConfig;
use detcast_camera::CameraConfig;
use detcast_detect::DetectorConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const LISTEN_PORT: u16 = 8080;

/// Live object detection served as an MJPEG stream.
#[derive(Parser, Debug, Clone)]
#[command(name = "detcast", version, about)]
pub struct CliArgs {
    /// ONNX SSD detection model
    #[arg(long)]
    pub model: PathBuf,

    /// Label file, "<index> <label>" or one bare label per line
    #[arg(long)]
    pub labels: PathBuf,

    /// Minimum score for a detection to be drawn
    #[arg(long, default_value_t = 0.4, value_parser = parse_threshold)]
    pub threshold: f32,

    #[arg(long, default_value_t = 512)]
    pub width: u32,

    #[arg(long, default_value_t = 512)]
    pub height: u32,

    #[arg(long, default_value_t = 30)]
    pub framerate: u32,

    /// Model input width
    #[arg(long, default_value_t = 300)]
    pub input_width: u32,

    /// Model input height
    #[arg(long, default_value_t = 300)]
    pub input_height: u32,

    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Pixel scale of the label and latency text
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub text_scale: u32,

    /// Bounding box outline width in pixels
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub box_thickness: u32,

    /// Capture from this V4L2 device (e.g. /dev/video0) instead of
    /// libcamera
    #[arg(long, value_name = "PATH")]
    pub device: Option<String>,

    /// Replay images matching this glob instead of opening the camera
    #[arg(long, value_name = "GLOB")]
    pub replay: Option<String>,
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside [0, 1]"))
    }
}

/// Everything `main` needs to assemble the node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub model: PathBuf,
    pub labels: PathBuf,
    pub replay: Option<String>,
    pub threshold: f32,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub annotator: AnnotatorConfig,
    pub listen: SocketAddr,
}

impl From<CliArgs> for NodeConfig {
    fn from(args: CliArgs) -> Self {
        let mut camera = CameraConfig::default()
            .with_width(args.width)
            .with_height(args.height)
            .with_fps(args.framerate);
        if let Some(device) = args.device {
            camera = camera.with_device(device);
        }
        Self {
            camera,
            detector: DetectorConfig::default()
                .with_input_width(args.input_width)
                .with_input_height(args.input_height),
            annotator: AnnotatorConfig::default()
                .with_jpeg_quality(args.jpeg_quality)
                .with_text_scale(args.text_scale)
                .with_box_thickness(args.box_thickness),
            threshold: args.threshold,
            model: args.model,
            labels: args.labels,
            replay: args.replay,
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, LISTEN_PORT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bounds() {
        assert_eq!(parse_threshold("0"), Ok(0.0));
        assert_eq!(parse_threshold("1"), Ok(1.0));
        assert!(parse_threshold("1.01").is_err());
        assert!(parse_threshold("-0.1").is_err());
        assert!(parse_threshold("high").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
