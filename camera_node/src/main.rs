//! detcast camera node: grabs frames, runs the SSD detector, draws the
//! results and serves them at
//!   /cam.mjpg  → multipart/x-mixed-replace JPEG stream
//!   /          → page embedding the stream

use anyhow::{Context, Result};
use clap::Parser;
use detcast_annotate::Annotator;
use detcast_camera::{FrameSource, ReplaySource};
use detcast_detect::{LabelTable, TractSsd};
use detcast_node::{CliArgs, NodeConfig, Producer};
use detcast_relay::Relay;
use detcast_stream::StreamServer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = NodeConfig::from(CliArgs::parse());

    // Startup: any failure here exits before we serve anything
    let labels = LabelTable::load(&config.labels)
        .with_context(|| format!("loading labels from {}", config.labels.display()))?;
    let detector = TractSsd::load(&config.model, &config.detector)
        .with_context(|| format!("loading model {}", config.model.display()))?;
    log::info!("model {} loaded", config.model.display());
    let source = open_source(&config)?;
    let listener = StreamServer::bind(config.listen).await?;

    let relay = Arc::new(Relay::new());
    let running = Arc::new(AtomicBool::new(true));
    let stop = Arc::new(Notify::new());
    {
        let (relay, running, stop) = (relay.clone(), running.clone(), stop.clone());
        ctrlc::set_handler(move || {
            if !running.swap(false, Ordering::SeqCst) {
                log::warn!("second shutdown request, exiting now");
                std::process::exit(130);
            }
            log::info!("shutdown requested");
            relay.close();
            stop.notify_one();
        })
        .context("installing signal handler")?;
    }

    let producer = Producer::new(
        source,
        detector,
        Annotator::new(config.annotator.clone()),
        Arc::new(labels),
        relay.clone(),
        config.threshold,
    );
    let producer_task = tokio::task::spawn_blocking({
        let running = running.clone();
        move || producer.run(&running)
    });

    let server = StreamServer::new(relay.clone());
    let served = server
        .serve(listener, async move { stop.notified().await })
        .await;

    // the server can also stop on its own; take the producer down with it
    running.store(false, Ordering::SeqCst);
    relay.close();
    let stats = producer_task.await.context("producer thread panicked")?;
    log::info!("final producer stats: {stats:?}");

    served?;
    Ok(())
}

fn open_source(config: &NodeConfig) -> Result<Box<dyn FrameSource>> {
    match &config.replay {
        Some(pattern) => {
            let replay = ReplaySource::open(pattern, config.camera.fps())
                .with_context(|| format!("opening replay {pattern:?}"))?;
            Ok(Box::new(replay))
        }
        None => {
            let camera = detcast_camera::open_live(&config.camera).context("opening camera")?;
            log::info!(
                "camera open at {}x{} @ {} fps",
                config.camera.width(),
                config.camera.height(),
                config.camera.fps()
            );
            Ok(camera)
        }
    }
}
