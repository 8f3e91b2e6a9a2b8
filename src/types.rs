// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub start: StartConfig,
    #[serde(default)]
    pub crosswalk: CrosswalkConfig,
    #[serde(default)]
    pub plates: PlateConfig,
    #[serde(default)]
    pub transition: TransitionConfig,
    #[serde(default)]
    pub outer_loop: OuterLoopConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Forward speed commanded by the action table.
    pub forward_x: f32,
    /// Turn rate commanded by the action table.
    pub turn_z: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            forward_x: 0.5,
            turn_z: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConfig {
    /// Tick index at which the "ready" announcement fires.
    pub ready_tick: u32,
    /// Global tick index of the one-shot end-of-run announcement.
    pub end_of_run_tick: u64,
    /// Scripted maneuver: forward burst until this tick...
    pub burst_ticks: u32,
    /// ...then spin in place until this tick, then hand over to OuterDrive.
    pub spin_ticks: u32,
    pub burst_command: (f32, f32),
    pub spin_command: (f32, f32),
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            ready_tick: 10,
            end_of_run_tick: 4000,
            burst_ticks: 20,
            spin_ticks: 26,
            burst_command: (0.7, 1.4),
            spin_command: (0.0, 2.8),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosswalkConfig {
    /// Red region area that counts as "red line close".
    pub red_area_threshold: u32,
    /// Forward speed forced while driving across.
    pub crossing_x: f32,
    /// Frame-count deadline for the crossing phase (FPS * 3 nominal).
    pub crossing_ticks: u32,
    /// Motion score below this reads as a stopped pedestrian.
    pub stopped_threshold: f32,
    /// Motion score above this reads as a moving pedestrian.
    pub moving_threshold: f32,
    /// Ticks ignored after stopping, letting braking blur settle.
    pub settle_ticks: u32,
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self {
            red_area_threshold: 5_000,
            crossing_x: 0.4,
            crossing_ticks: 60,
            stopped_threshold: 9.0,
            moving_threshold: 40.0,
            settle_ticks: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateConfig {
    /// Blue-region area band that marks a parked car as close.
    pub slow_area_lower: u32,
    pub slow_area_upper: u32,
    /// Ticks the careful/eligible window survives after leaving the band.
    pub eligible_window_ticks: u32,
    /// Careful-driving speed clamps, sign-preserving.
    pub slow_x: f32,
    pub slow_z: f32,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            slow_area_lower: 9_000,
            slow_area_upper: 60_000,
            eligible_window_ticks: 5,
            slow_x: 0.07,
            slow_z: 0.55,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Degrees of line tilt tolerated as "straight".
    pub straight_degs_tolerance: f32,
    /// Target pixel row of the reference line once aligned.
    pub target_row: f32,
    pub target_row_tolerance: f32,
    /// Blue area that ends the in-place turn into the inner loop.
    pub turn_blue_area_threshold: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            straight_degs_tolerance: 0.3,
            target_row: 445.0,
            target_row_tolerance: 5.0,
            turn_blue_area_threshold: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterLoopConfig {
    /// Wall-clock floor before the outer loop may end.
    pub min_secs: f64,
    /// Crosswalk stop episodes required before the outer loop may end.
    pub min_crosswalk_stops: u32,
}

impl Default for OuterLoopConfig {
    fn default() -> Self {
        Self {
            min_secs: 10.0,
            min_crosswalk_stops: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceConfig {
    pub team_token: String,
    pub session_token: String,
    /// Placeholder plate carried in lifecycle announcements.
    pub placeholder_plate: String,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            team_token: "TeamYoonifer".to_string(),
            session_token: "multi21".to_string(),
            placeholder_plate: "AA00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub fps: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "frames".to_string(),
            output_dir: "output".to_string(),
            fps: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One camera frame, packed RGB8 row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn rgb_at(&self, row: usize, col: usize) -> (u8, u8, u8) {
        let i = (row * self.width + col) * 3;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }
}

/// Actuator command: one per processed frame, always.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear: f32,
    pub angular: f32,
}

impl VelocityCommand {
    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self {
            linear: 0.0,
            angular: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}

/// Discrete driving action produced by the external classifier.
///
/// The index/velocity table is fixed:
/// `0→(X,0), 1→(0,-Z), 2→(0,Z), 3→(X,-Z), 4→(X,Z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveAction {
    Forward,
    SpinRight,
    SpinLeft,
    ForwardRight,
    ForwardLeft,
}

impl DriveAction {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(DriveAction::Forward),
            1 => Some(DriveAction::SpinRight),
            2 => Some(DriveAction::SpinLeft),
            3 => Some(DriveAction::ForwardRight),
            4 => Some(DriveAction::ForwardLeft),
            _ => None,
        }
    }

    pub fn command(&self, x: f32, z: f32) -> VelocityCommand {
        match self {
            DriveAction::Forward => VelocityCommand::new(x, 0.0),
            DriveAction::SpinRight => VelocityCommand::new(0.0, -z),
            DriveAction::SpinLeft => VelocityCommand::new(0.0, z),
            DriveAction::ForwardRight => VelocityCommand::new(x, -z),
            DriveAction::ForwardLeft => VelocityCommand::new(x, z),
        }
    }
}

/// Dominant straight edge of the reference-colored line, or a sentinel
/// when no line is visible / the fit is degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineEstimate {
    Lost,
    Found {
        /// Tilt in degrees; 0 means the line runs level across the frame.
        angle_deg: f32,
        /// Mean pixel row of the line.
        row: f32,
    },
}

impl LineEstimate {
    pub fn is_lost(&self) -> bool {
        matches!(self, LineEstimate::Lost)
    }
}

/// Per-frame derived values, consumed and discarded within one tick.
#[derive(Debug, Clone)]
pub struct FeatureBundle {
    /// Largest blue region in the plate-watch crop, px.
    pub blue_area: u32,
    /// Largest blue region in the turn-watch crop, px.
    pub turn_blue_area: u32,
    /// Largest red region over the full frame, px.
    pub red_area: u32,
    pub line: LineEstimate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_table_matches_fixed_mapping() {
        let x = 0.5;
        let z = 0.5;
        assert_eq!(
            DriveAction::Forward.command(x, z),
            VelocityCommand::new(0.5, 0.0)
        );
        assert_eq!(
            DriveAction::SpinRight.command(x, z),
            VelocityCommand::new(0.0, -0.5)
        );
        assert_eq!(
            DriveAction::SpinLeft.command(x, z),
            VelocityCommand::new(0.0, 0.5)
        );
        assert_eq!(
            DriveAction::ForwardRight.command(x, z),
            VelocityCommand::new(0.5, -0.5)
        );
        assert_eq!(
            DriveAction::ForwardLeft.command(x, z),
            VelocityCommand::new(0.5, 0.5)
        );
    }

    #[test]
    fn action_indices_round_trip() {
        for i in 0..5 {
            assert!(DriveAction::from_index(i).is_some());
        }
        assert!(DriveAction::from_index(5).is_none());
    }

    #[test]
    fn default_config_thresholds_are_ordered() {
        let cfg = Config::default();
        assert!(cfg.crosswalk.stopped_threshold < cfg.crosswalk.moving_threshold);
        assert!(cfg.plates.slow_area_lower < cfg.plates.slow_area_upper);
    }
}
