// src/interface.rs
//
// Boundary traits toward the actuator and the scoring channel, plus the
// file-backed implementations the replay binary uses.

use crate::types::{AnnounceConfig, VelocityCommand};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Fire-and-forget lifecycle announcement: a comma-separated
/// `(team, session, stage, plate)` tuple.
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub team_token: String,
    pub session_token: String,
    pub stage_marker: i32,
    pub plate: String,
}

impl Announcement {
    pub fn ready(cfg: &AnnounceConfig) -> Self {
        Self {
            team_token: cfg.team_token.clone(),
            session_token: cfg.session_token.clone(),
            stage_marker: 0,
            plate: cfg.placeholder_plate.clone(),
        }
    }

    pub fn end_of_run(cfg: &AnnounceConfig) -> Self {
        Self {
            team_token: cfg.team_token.clone(),
            session_token: cfg.session_token.clone(),
            stage_marker: -1,
            plate: cfg.placeholder_plate.clone(),
        }
    }

    pub fn payload(&self) -> String {
        format!(
            "{},{},{},{}",
            self.team_token, self.session_token, self.stage_marker, self.plate
        )
    }
}

/// Accepts exactly one velocity command per processed frame.
pub trait CommandSink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<()>;
}

/// Delivery side of the announcement channel.
pub trait Announcer {
    fn announce(&mut self, announcement: &Announcement) -> Result<()>;
}

/// Swallows commands; useful when only the returned command matters.
pub struct NullSink;

impl CommandSink for NullSink {
    fn publish(&mut self, _cmd: &VelocityCommand) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per command, JSONL.
pub struct JsonlCommandSink {
    file: File,
}

impl JsonlCommandSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("creating command log at {}", path.display()))?;
        Ok(Self { file })
    }
}

impl CommandSink for JsonlCommandSink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<()> {
        let line = serde_json::to_string(cmd)?;
        writeln!(self.file, "{line}")?;
        Ok(())
    }
}

/// Logs the announcement payload; stands in for the real channel.
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&mut self, announcement: &Announcement) -> Result<()> {
        info!("📣 announcement: {}", announcement.payload());
        Ok(())
    }
}
