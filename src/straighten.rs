// src/straighten.rs
//
// Precision alignment against the red reference line during the
// outer→inner transition: square up the tilt first, then creep the line
// onto the target pixel row. Angular and linear corrections are never
// mixed in one command.

use crate::types::{LineEstimate, TransitionConfig, VelocityCommand};

/// Proportional gains for the corrective nudges.
const ANGULAR_GAIN: f32 = 1.0 / 10.0;
const LINEAR_GAIN: f32 = 1.0 / 5.0;

/// Three-way classification of the line tilt, plus the sentinel for a
/// missing or degenerate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleState {
    Left,
    Straight,
    Right,
    Lost,
}

/// Three-way classification of the line's vertical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetState {
    Before,
    At,
    Past,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StraightenOutcome {
    /// Both classifications centered on the same tick.
    Aligned,
    /// Keep correcting with this command.
    Correcting(VelocityCommand),
    /// Line not detectable; hold position rather than guess.
    Hold,
}

pub struct StraightenProtocol {
    angle_tolerance_deg: f32,
    target_row: f32,
    row_tolerance: f32,
}

impl StraightenProtocol {
    pub fn new(cfg: &TransitionConfig) -> Self {
        Self {
            angle_tolerance_deg: cfg.straight_degs_tolerance,
            target_row: cfg.target_row,
            row_tolerance: cfg.target_row_tolerance,
        }
    }

    pub fn classify_angle(&self, line: &LineEstimate) -> AngleState {
        match line {
            LineEstimate::Lost => AngleState::Lost,
            LineEstimate::Found { angle_deg, .. } => {
                if angle_deg.abs() < self.angle_tolerance_deg {
                    AngleState::Straight
                } else if *angle_deg < 0.0 {
                    AngleState::Left
                } else {
                    AngleState::Right
                }
            }
        }
    }

    pub fn classify_offset(&self, line: &LineEstimate) -> OffsetState {
        match line {
            LineEstimate::Lost => OffsetState::Lost,
            LineEstimate::Found { row, .. } => {
                if (row - self.target_row).abs() < self.row_tolerance {
                    OffsetState::At
                } else if *row < self.target_row {
                    OffsetState::Before
                } else {
                    OffsetState::Past
                }
            }
        }
    }

    /// One protocol step for the current line estimate.
    pub fn step(&self, line: &LineEstimate) -> StraightenOutcome {
        let angle = self.classify_angle(line);
        let offset = self.classify_offset(line);

        if angle == AngleState::Lost || offset == OffsetState::Lost {
            return StraightenOutcome::Hold;
        }

        if angle == AngleState::Straight && offset == OffsetState::At {
            return StraightenOutcome::Aligned;
        }

        let angle_sign = match angle {
            AngleState::Left => -1.0,
            AngleState::Right => 1.0,
            _ => 0.0,
        };
        let offset_sign = match offset {
            OffsetState::Before => -1.0,
            OffsetState::Past => 1.0,
            _ => 0.0,
        };

        // square the tilt away first; only a straight line gets creep
        let angular = -angle_sign * ANGULAR_GAIN;
        let linear = if angle == AngleState::Straight {
            -offset_sign * LINEAR_GAIN
        } else {
            0.0
        };

        StraightenOutcome::Correcting(VelocityCommand::new(linear, angular))
    }
}
