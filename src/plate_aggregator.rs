// src/plate_aggregator.rs
//
// Confidence-weighted aggregation of per-frame (identifier, plate)
// observations. Many weak, error-prone readings are merged into running
// tallies during the outer loop, averaged exactly once when the loop
// ends, and resolved into one best plate per identifier.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One qualifying frame's recognizer output.
#[derive(Debug, Clone)]
pub struct ObservationSample {
    pub identifier: String,
    pub id_confidence: Vec<f32>,
    pub plate: String,
    /// One confidence vector per character slot.
    pub plate_confidence: Vec<Vec<f32>>,
}

/// Running tally for one vehicle identifier.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityTally {
    pub count: u32,
    /// Summed per-class confidence; averaged by `finalize`.
    pub confidence: Vec<f32>,
    /// Plates seen with this identifier, in first-seen order.
    pub plates: Vec<String>,
}

/// Running tally for one plate text.
#[derive(Debug, Clone, Serialize)]
pub struct PlateTally {
    pub count: u32,
    /// Summed per-slot confidence vectors; averaged by `finalize`.
    pub confidence: Vec<Vec<f32>>,
}

#[derive(Default)]
pub struct PlateAggregator {
    identities: HashMap<String, IdentityTally>,
    identity_order: Vec<String>,
    plates: HashMap<String, PlateTally>,
    finalized: bool,
}

fn add_assign(acc: &mut Vec<f32>, other: &[f32]) {
    if acc.len() < other.len() {
        acc.resize(other.len(), 0.0);
    }
    for (a, b) in acc.iter_mut().zip(other.iter()) {
        *a += b;
    }
}

impl PlateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observation_count(&self) -> u32 {
        self.identities.values().map(|t| t.count).sum()
    }

    /// Fold one observation into the tallies. Tallies are created lazily
    /// and only ever grow.
    pub fn observe(&mut self, sample: &ObservationSample) {
        debug_assert!(!self.finalized, "observe after finalize");
        if self.finalized {
            warn!("dropping observation received after finalize");
            return;
        }

        let identity = self
            .identities
            .entry(sample.identifier.clone())
            .or_insert_with(|| {
                self.identity_order.push(sample.identifier.clone());
                IdentityTally {
                    count: 0,
                    confidence: Vec::new(),
                    plates: Vec::new(),
                }
            });
        identity.count += 1;
        add_assign(&mut identity.confidence, &sample.id_confidence);
        if !identity.plates.iter().any(|p| p == &sample.plate) {
            identity.plates.push(sample.plate.clone());
        }

        let plate = self
            .plates
            .entry(sample.plate.clone())
            .or_insert_with(|| PlateTally {
                count: 0,
                confidence: Vec::new(),
            });
        plate.count += 1;
        if plate.confidence.len() < sample.plate_confidence.len() {
            plate.confidence.resize(sample.plate_confidence.len(), Vec::new());
        }
        for (slot, vec) in sample.plate_confidence.iter().enumerate() {
            add_assign(&mut plate.confidence[slot], vec);
        }
    }

    /// Average every summed confidence vector by its count. Strictly
    /// one-shot: a second call is a programming error (asserted in debug,
    /// ignored in release).
    pub fn finalize(&mut self) {
        debug_assert!(!self.finalized, "finalize called twice");
        if self.finalized {
            warn!("finalize called twice; ignoring");
            return;
        }
        self.finalized = true;

        for tally in self.identities.values_mut() {
            let n = tally.count as f32;
            for v in tally.confidence.iter_mut() {
                *v /= n;
            }
        }
        for tally in self.plates.values_mut() {
            let n = tally.count as f32;
            for slot in tally.confidence.iter_mut() {
                for v in slot.iter_mut() {
                    *v /= n;
                }
            }
        }
    }

    /// Best plate per identifier: the observed plate with the highest
    /// tally count, ties to the earlier-seen plate. Empty input yields an
    /// empty mapping. Must follow `finalize`.
    pub fn resolve(&self) -> HashMap<String, String> {
        debug_assert!(self.finalized, "resolve before finalize");
        if !self.finalized {
            warn!("resolve called before finalize; returning empty result");
            return HashMap::new();
        }

        let mut results = HashMap::new();
        for id in &self.identity_order {
            let identity = &self.identities[id];
            let mut best: Option<&str> = None;
            let mut best_count = 0u32;
            for plate in &identity.plates {
                let count = self.plates.get(plate).map(|t| t.count).unwrap_or(0);
                if count > best_count {
                    best_count = count;
                    best = Some(plate);
                }
            }
            if let Some(plate) = best {
                results.insert(id.clone(), plate.to_string());
            }
        }
        results
    }

    /// Log the finalized tallies and the resolved mapping.
    pub fn report(&self) -> HashMap<String, String> {
        let results = self.resolve();
        info!("plate report: {} identifier(s)", self.identity_order.len());
        for id in &self.identity_order {
            let tally = &self.identities[id];
            let peak = tally
                .confidence
                .iter()
                .copied()
                .fold(0.0f32, f32::max);
            info!(
                "  {} seen {}x, peak avg confidence {:.3}, plates {:?} -> {}",
                id,
                tally.count,
                peak,
                tally.plates,
                results.get(id).map(String::as_str).unwrap_or("-")
            );
        }
        results
    }
}
