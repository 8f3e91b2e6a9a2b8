// src/main.rs

mod config;
mod controller;
mod features;
mod interface;
mod models;
mod pedestrian_gate;
mod plate_aggregator;
mod replay;
mod segmentation;
mod straighten;
mod types;

use anyhow::Result;
use controller::Controller;
use interface::{JsonlCommandSink, LogAnnouncer};
use models::{FixedClassifier, NoopRecognizer};
use std::path::Path;
use tracing::info;
use types::{Config, DriveAction};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("track_pilot={}", cfg.logging.level))
        .init();

    info!("🤖 Track Pilot Starting");
    info!("config: {config_path}");

    let output_dir = Path::new(&cfg.replay.output_dir);
    std::fs::create_dir_all(output_dir)?;
    let sink = JsonlCommandSink::create(&output_dir.join("commands.jsonl"))?;

    // Dry-run stand-ins until trained model backends are wired in.
    let mut controller = Controller::new(
        cfg.clone(),
        Box::new(FixedClassifier::new(DriveAction::Forward)),
        Box::new(NoopRecognizer),
        Box::new(sink),
        Box::new(LogAnnouncer),
    );

    let processed = replay::run(&cfg.replay, &mut controller).await?;

    info!(
        "run finished in state {} after {} tick(s)",
        controller.state_name(),
        processed
    );
    if let Some(plates) = controller.final_plates() {
        for (id, plate) in plates {
            info!("🚘 {id} -> {plate}");
        }
    }

    Ok(())
}
