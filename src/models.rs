// src/models.rs
//
// Capability interfaces for the two trained models. The controller never
// sees their numerics; it consumes a discrete action and an optional
// plate reading, and treats any model error as a skipped tick.

use crate::types::{DriveAction, Frame};
use anyhow::Result;

/// Output of the identifier/plate recognizer for one frame.
#[derive(Debug, Clone)]
pub struct PlateReading {
    pub identifier: String,
    pub id_confidence: Vec<f32>,
    pub plate: Option<PlateText>,
}

#[derive(Debug, Clone)]
pub struct PlateText {
    pub text: String,
    /// One confidence vector per character slot.
    pub char_confidence: Vec<Vec<f32>>,
}

/// Maps a frame to one of the five discrete driving actions.
pub trait ActionClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<DriveAction>;
}

/// Reads a vehicle identifier (and, when visible, its plate) off a frame.
pub trait PlateRecognizer {
    fn recognize(&mut self, frame: &Frame) -> Result<Option<PlateReading>>;
}

/// Always emits the same action. Stands in for the trained drive model in
/// replay dry-runs and tests.
pub struct FixedClassifier {
    pub action: DriveAction,
}

impl FixedClassifier {
    pub fn new(action: DriveAction) -> Self {
        Self { action }
    }
}

impl ActionClassifier for FixedClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<DriveAction> {
        Ok(self.action)
    }
}

/// Never sees a plate. The recognizer counterpart of `FixedClassifier`.
pub struct NoopRecognizer;

impl PlateRecognizer for NoopRecognizer {
    fn recognize(&mut self, _frame: &Frame) -> Result<Option<PlateReading>> {
        Ok(None)
    }
}

#[cfg(test)]
pub mod stubs {
    use super::*;
    use anyhow::bail;
    use std::collections::VecDeque;

    /// Fails every call; exercises the skip-tick policy.
    pub struct FailingClassifier;

    impl ActionClassifier for FailingClassifier {
        fn classify(&mut self, _frame: &Frame) -> Result<DriveAction> {
            bail!("model unavailable")
        }
    }

    /// Replays a fixed queue of readings, then reports nothing.
    pub struct ScriptedRecognizer {
        pub readings: VecDeque<Option<PlateReading>>,
    }

    impl ScriptedRecognizer {
        pub fn new(readings: Vec<Option<PlateReading>>) -> Self {
            Self {
                readings: readings.into(),
            }
        }
    }

    impl PlateRecognizer for ScriptedRecognizer {
        fn recognize(&mut self, _frame: &Frame) -> Result<Option<PlateReading>> {
            Ok(self.readings.pop_front().flatten())
        }
    }

    pub fn reading(id: &str, plate: &str) -> PlateReading {
        PlateReading {
            identifier: id.to_string(),
            id_confidence: vec![0.2, 0.7, 0.1],
            plate: Some(PlateText {
                text: plate.to_string(),
                char_confidence: vec![vec![0.9, 0.1]; 4],
            }),
        }
    }
}
