// src/replay.rs
//
// Frame replay harness: walks a directory of still frames, paces them at
// the configured FPS on a producer task, and feeds the controller through
// a watch channel. The channel keeps only the newest frame, so a slow
// control tick drops stale frames instead of queueing them.

use crate::controller::Controller;
use crate::types::{Frame, ReplayConfig};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// All replayable frames under `dir`, sorted by path so numbered dumps
/// play back in capture order.
pub fn discover_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no frames found under {}", dir.display());
    }
    Ok(paths)
}

pub fn load_frame(path: &Path, timestamp_ms: f64) -> Result<Frame> {
    let img = image::open(path)
        .with_context(|| format!("loading frame {}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame {
        data: img.into_raw(),
        width: width as usize,
        height: height as usize,
        timestamp_ms,
    })
}

/// Replay every frame under `replay.input_dir` through the controller.
/// Returns the number of control ticks actually executed, which can be
/// lower than the frame count when ticks run long.
pub async fn run(replay: &ReplayConfig, controller: &mut Controller) -> Result<u64> {
    let paths = discover_frames(Path::new(&replay.input_dir))?;
    info!(
        "🎞️  replaying {} frame(s) from {} at {} fps",
        paths.len(),
        replay.input_dir,
        replay.fps
    );

    let interval = Duration::from_secs_f64(1.0 / replay.fps.max(1) as f64);
    let (tx, mut rx) = watch::channel::<Option<(u64, Frame)>>(None);

    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        for (seq, path) in paths.into_iter().enumerate() {
            ticker.tick().await;
            let timestamp_ms = seq as f64 * interval.as_secs_f64() * 1000.0;
            match load_frame(&path, timestamp_ms) {
                Ok(frame) => {
                    if tx.send(Some((seq as u64, frame))).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("skipping unreadable frame {}: {e:#}", path.display()),
            }
        }
        // dropping the sender ends the consumer loop
    });

    let mut processed = 0u64;
    let mut last_seq: Option<u64> = None;
    loop {
        if rx.changed().await.is_err() {
            break;
        }
        let Some((seq, frame)) = rx.borrow_and_update().clone() else {
            continue;
        };
        if let Some(prev) = last_seq {
            let dropped = seq.saturating_sub(prev + 1);
            if dropped > 0 {
                debug!("dropped {dropped} stale frame(s) before seq {seq}");
            }
        }
        last_seq = Some(seq);
        controller.process(&frame)?;
        processed += 1;
    }

    producer.await?;
    info!("✅ replay complete: {processed} control tick(s)");
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{LogAnnouncer, NullSink};
    use crate::models::{FixedClassifier, NoopRecognizer};
    use crate::types::{Config, DriveAction};
    use std::fs;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("track-pilot-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn discovery_filters_extensions_and_sorts() {
        let dir = scratch_dir("discover");
        for name in ["b.png", "a.jpg", "notes.txt", "c.JPEG"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        let frames = discover_frames(&dir).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png", "c.JPEG"]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = scratch_dir("empty");
        assert!(discover_frames(&dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn replay_feeds_every_frame_when_ticks_are_fast() {
        let dir = scratch_dir("replay");
        for i in 0..3 {
            let img = image::RgbImage::from_pixel(16, 16, image::Rgb([120, 120, 120]));
            img.save(dir.join(format!("frame_{i:04}.png"))).unwrap();
        }

        let replay = ReplayConfig {
            input_dir: dir.to_string_lossy().to_string(),
            output_dir: dir.to_string_lossy().to_string(),
            fps: 1_000,
        };
        let mut controller = Controller::new(
            Config::default(),
            Box::new(FixedClassifier::new(DriveAction::Forward)),
            Box::new(NoopRecognizer),
            Box::new(NullSink),
            Box::new(LogAnnouncer),
        );

        let processed = run(&replay, &mut controller).await.unwrap();
        assert!(processed >= 1 && processed <= 3);
        assert_eq!(controller.ticks_processed(), processed);
        fs::remove_dir_all(&dir).ok();
    }
}
