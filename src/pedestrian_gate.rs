// src/pedestrian_gate.rs
//
// Safe-crossing gate, evaluated every tick while stopped at the crosswalk.
//
// Clearance requires witnessing the pedestrian in a moving state and a
// *subsequent* stopped state within the same episode. A stopped reading
// recorded before any moving reading never clears the gate on its own;
// that ordering is deliberate and matches the crossing behavior this
// controller was tuned against.

use crate::segmentation::{self, GrayPatch};
use crate::types::{CrosswalkConfig, Frame};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Not yet safe; stay stopped.
    Hold,
    /// Pedestrian confirmed stopped after moving; cross now.
    Safe,
}

pub struct PedestrianGate {
    stopped_threshold: f32,
    moving_threshold: f32,
    settle_ticks: u32,

    reference: Option<GrayPatch>,
    settle_remaining: u32,
    seen_stopped: bool,
    seen_moving: bool,
}

impl PedestrianGate {
    pub fn new(cfg: &CrosswalkConfig) -> Self {
        // a dead zone between the thresholds is required; equal or inverted
        // thresholds would flap on borderline frames
        debug_assert!(cfg.stopped_threshold < cfg.moving_threshold);
        Self {
            stopped_threshold: cfg.stopped_threshold,
            moving_threshold: cfg.moving_threshold,
            settle_ticks: cfg.settle_ticks,
            reference: None,
            settle_remaining: cfg.settle_ticks,
            seen_stopped: false,
            seen_moving: false,
        }
    }

    /// Clear all episode state. Called on every new crosswalk-stop episode
    /// and internally when the gate reports `Safe`.
    pub fn reset_episode(&mut self) {
        self.reference = None;
        self.settle_remaining = self.settle_ticks;
        self.seen_stopped = false;
        self.seen_moving = false;
    }

    /// One gate tick: score the current frame against the rolling reference
    /// crop, then classify.
    pub fn tick(&mut self, frame: &Frame) -> GateDecision {
        let current = segmentation::central_gray_crop(frame);

        let score = match self.reference.take() {
            None => {
                self.reference = Some(current);
                return GateDecision::Hold;
            }
            Some(prev) => {
                let score = segmentation::motion_score(&prev, &current);
                self.reference = Some(current);
                score
            }
        };

        debug!(
            score,
            seen_stopped = self.seen_stopped,
            seen_moving = self.seen_moving,
            "pedestrian gate"
        );
        self.evaluate(score)
    }

    /// Classify one motion score. Separated from `tick` so the protocol can
    /// be exercised on raw score sequences.
    pub fn evaluate(&mut self, score: f32) -> GateDecision {
        if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
            return GateDecision::Hold;
        }

        if score < self.stopped_threshold {
            if !self.seen_stopped {
                self.seen_stopped = true;
                return GateDecision::Hold;
            }
            if self.seen_moving {
                self.reset_episode();
                return GateDecision::Safe;
            }
        } else if score > self.moving_threshold && !self.seen_moving {
            self.seen_moving = true;
        }

        // ambiguous band, or ordering not yet satisfied
        GateDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(stopped: f32, moving: f32, settle: u32) -> PedestrianGate {
        PedestrianGate::new(&CrosswalkConfig {
            stopped_threshold: stopped,
            moving_threshold: moving,
            settle_ticks: settle,
            ..CrosswalkConfig::default()
        })
    }

    fn run(gate: &mut PedestrianGate, scores: &[f32]) -> Vec<GateDecision> {
        scores.iter().map(|&s| gate.evaluate(s)).collect()
    }

    #[test]
    fn moving_then_stopped_scenario() {
        // scores [50, 50, 5, 5], thresholds 9/40, no settle:
        // tick 1 sets seen_moving, tick 3 sets seen_stopped, tick 4 clears
        let mut g = gate(9.0, 40.0, 0);
        let out = run(&mut g, &[50.0, 50.0, 5.0, 5.0]);
        assert_eq!(
            out,
            vec![
                GateDecision::Hold,
                GateDecision::Hold,
                GateDecision::Hold,
                GateDecision::Safe
            ]
        );
    }

    #[test]
    fn stopped_before_moving_never_clears_alone() {
        let mut g = gate(9.0, 40.0, 0);
        // endless stillness without any moving observation
        let out = run(&mut g, &[1.0; 200]);
        assert!(out.iter().all(|d| *d == GateDecision::Hold));
    }

    #[test]
    fn safe_requires_moving_strictly_before_a_later_stopped() {
        let mut g = gate(9.0, 40.0, 0);
        // stopped, stopped, moving, then stopped again: first two stopped
        // readings only arm seen_stopped; safety comes after the move
        let out = run(&mut g, &[2.0, 2.0, 80.0, 2.0]);
        assert_eq!(out[0], GateDecision::Hold);
        assert_eq!(out[1], GateDecision::Hold);
        assert_eq!(out[2], GateDecision::Hold);
        assert_eq!(out[3], GateDecision::Safe);
    }

    #[test]
    fn settle_window_ignores_exactly_that_many_ticks() {
        let mut g = gate(9.0, 40.0, 3);
        // the first 3 ticks are swallowed regardless of content
        assert_eq!(g.evaluate(80.0), GateDecision::Hold);
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
        // tick 4 is the first classified one
        assert_eq!(g.evaluate(80.0), GateDecision::Hold); // moving
        assert_eq!(g.evaluate(1.0), GateDecision::Hold); // first stopped
        assert_eq!(g.evaluate(1.0), GateDecision::Safe);
    }

    #[test]
    fn dead_zone_counts_as_neither() {
        let mut g = gate(9.0, 40.0, 0);
        // every score inside (9, 40): no flag ever set, never safe
        let out = run(&mut g, &[20.0; 50]);
        assert!(out.iter().all(|d| *d == GateDecision::Hold));
    }

    #[test]
    fn episode_reset_clears_flags() {
        let mut g = gate(9.0, 40.0, 0);
        run(&mut g, &[80.0, 1.0]); // arm both flags
        g.reset_episode();
        // next stopped reading must not clear: flags were wiped
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
    }

    #[test]
    fn gate_resets_itself_after_reporting_safe() {
        let mut g = gate(9.0, 40.0, 0);
        let out = run(&mut g, &[80.0, 1.0, 1.0]);
        assert_eq!(out[2], GateDecision::Safe);
        // a fresh episode: stillness alone holds again
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
        assert_eq!(g.evaluate(1.0), GateDecision::Hold);
    }

    #[test]
    fn first_tick_installs_reference_and_holds() {
        let mut g = gate(9.0, 40.0, 0);
        let frame = Frame {
            data: vec![128; 40 * 40 * 3],
            width: 40,
            height: 40,
            timestamp_ms: 0.0,
        };
        assert_eq!(g.tick(&frame), GateDecision::Hold);
        assert!(g.reference.is_some());
        // identical frame scores 0 => first stopped observation
        assert_eq!(g.tick(&frame), GateDecision::Hold);
        assert!(g.seen_stopped);
        assert!(!g.seen_moving);
    }
}
