//! detcast node: wires the camera, detector, annotator, relay and stream
//! server into one process. The `detcast` binary is a thin `main` over this.

pub mod cli;
pub mod producer;

pub use cli::{CliArgs, NodeConfig, LISTEN_PORT};
pub use producer::{Producer, ProducerError, ProducerStats};
