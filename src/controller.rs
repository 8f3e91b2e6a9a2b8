// src/controller.rs
//
// The navigation state machine. One frame in, one command out, every
// tick. The hand-rolled boolean cascade this replaces (start/transition/
// turning/inner flags that could all be true at once) is re-architected
// as a tagged state enum with one handler per state; the crosswalk
// phases live inside OuterDrive where they belong.

use crate::features::FeatureExtractor;
use crate::interface::{Announcement, Announcer, CommandSink};
use crate::models::{ActionClassifier, PlateRecognizer};
use crate::pedestrian_gate::{GateDecision, PedestrianGate};
use crate::plate_aggregator::{ObservationSample, PlateAggregator};
use crate::straighten::{StraightenOutcome, StraightenProtocol};
use crate::types::{Config, Frame, VelocityCommand};
use anyhow::Result;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// In-place turn rate while swinging into the inner loop.
const TURN_IN_RATE: f32 = 1.0;

#[derive(Debug)]
enum DriveState {
    StartSequence { tick: u32 },
    OuterDrive(OuterState),
    AwaitingOuterLoopEnd,
    Straightening,
    TurningIntoInner,
    InnerDrive,
    Finished,
}

impl DriveState {
    fn name(&self) -> &'static str {
        match self {
            DriveState::StartSequence { .. } => "START_SEQUENCE",
            DriveState::OuterDrive(_) => "OUTER_DRIVE",
            DriveState::AwaitingOuterLoopEnd => "AWAITING_OUTER_LOOP_END",
            DriveState::Straightening => "STRAIGHTENING",
            DriveState::TurningIntoInner => "TURNING_INTO_INNER",
            DriveState::InnerDrive => "INNER_DRIVE",
            DriveState::Finished => "FINISHED",
        }
    }
}

/// State owned by the OuterDrive handler, reset when the state is left.
#[derive(Debug)]
struct OuterState {
    crosswalk: CrosswalkPhase,
    /// Completed stop episodes this run.
    stops: u32,
    /// Ticks since the blue area last sat in the careful band. Starts
    /// saturated so the run begins ineligible.
    ticks_out_of_band: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrosswalkPhase {
    Clear,
    Stopped { counted: bool },
    Crossing { remaining: u32 },
}

impl OuterState {
    fn new(eligible_window_ticks: u32) -> Self {
        Self {
            crosswalk: CrosswalkPhase::Clear,
            stops: 0,
            ticks_out_of_band: eligible_window_ticks,
        }
    }
}

/// Sign-preserving replacement with the careful-driving magnitude.
fn careful(value: f32, magnitude: f32) -> f32 {
    if value > 0.0 {
        magnitude
    } else if value < 0.0 {
        -magnitude
    } else {
        0.0
    }
}

pub struct Controller {
    cfg: Config,
    extractor: FeatureExtractor,
    classifier: Box<dyn ActionClassifier>,
    recognizer: Box<dyn PlateRecognizer>,
    sink: Box<dyn CommandSink>,
    announcer: Box<dyn Announcer>,

    state: DriveState,
    gate: PedestrianGate,
    straighten: StraightenProtocol,
    aggregator: PlateAggregator,
    results: Option<HashMap<String, String>>,

    tick: u64,
    started: Instant,
    end_announced: bool,
}

impl Controller {
    pub fn new(
        cfg: Config,
        classifier: Box<dyn ActionClassifier>,
        recognizer: Box<dyn PlateRecognizer>,
        sink: Box<dyn CommandSink>,
        announcer: Box<dyn Announcer>,
    ) -> Self {
        let gate = PedestrianGate::new(&cfg.crosswalk);
        let straighten = StraightenProtocol::new(&cfg.transition);
        Self {
            cfg,
            extractor: FeatureExtractor::new(),
            classifier,
            recognizer,
            sink,
            announcer,
            state: DriveState::StartSequence { tick: 0 },
            gate,
            straighten,
            aggregator: PlateAggregator::new(),
            results: None,
            tick: 0,
            started: Instant::now(),
            end_announced: false,
        }
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn ticks_processed(&self) -> u64 {
        self.tick
    }

    /// Plate observations accumulated so far.
    pub fn observations(&self) -> u32 {
        self.aggregator.observation_count()
    }

    /// The resolved identifier→plate mapping, once the outer loop ended.
    pub fn final_plates(&self) -> Option<&HashMap<String, String>> {
        self.results.as_ref()
    }

    /// One synchronous pass: frame in, command out. The command is both
    /// published to the sink and returned.
    pub fn process(&mut self, frame: &Frame) -> Result<VelocityCommand> {
        self.tick += 1;

        if !self.end_announced && self.tick >= self.cfg.start.end_of_run_tick {
            self.end_announced = true;
            self.fire(Announcement::end_of_run(&self.cfg.announce));
            info!("🏁 end-of-run mark at tick {}", self.tick);
            self.state = DriveState::Finished;
        }

        let state = std::mem::replace(&mut self.state, DriveState::Finished);
        let (next, cmd) = match state {
            DriveState::StartSequence { tick } => self.start_tick(tick),
            DriveState::OuterDrive(st) => self.outer_tick(st, frame),
            DriveState::AwaitingOuterLoopEnd => self.finish_outer_loop(),
            DriveState::Straightening => self.straighten_tick(frame),
            DriveState::TurningIntoInner => self.turn_tick(frame),
            DriveState::InnerDrive => (DriveState::InnerDrive, self.classify(frame)),
            DriveState::Finished => (DriveState::Finished, VelocityCommand::zero()),
        };
        self.state = next;

        self.sink.publish(&cmd)?;
        Ok(cmd)
    }

    // ── state handlers ──────────────────────────────────────────────────

    /// Scripted open-loop maneuver; perception is ignored on purpose.
    fn start_tick(&mut self, t: u32) -> (DriveState, VelocityCommand) {
        let s = self.cfg.start.clone();

        if t == s.ready_tick {
            self.fire(Announcement::ready(&self.cfg.announce));
            info!("🚦 ready announced at start tick {t}");
        }

        if t <= s.ready_tick {
            return (
                DriveState::StartSequence { tick: t + 1 },
                VelocityCommand::zero(),
            );
        }
        if t < s.burst_ticks {
            let (x, z) = s.burst_command;
            return (
                DriveState::StartSequence { tick: t + 1 },
                VelocityCommand::new(x, z),
            );
        }
        if t < s.spin_ticks {
            let (x, z) = s.spin_command;
            return (
                DriveState::StartSequence { tick: t + 1 },
                VelocityCommand::new(x, z),
            );
        }

        info!("✓ start sequence complete; entering outer loop");
        (
            DriveState::OuterDrive(OuterState::new(self.cfg.plates.eligible_window_ticks)),
            VelocityCommand::zero(),
        )
    }

    fn outer_tick(&mut self, mut st: OuterState, frame: &Frame) -> (DriveState, VelocityCommand) {
        let features = self.extractor.extract(frame);

        if self.outer_loop_done(&st) {
            info!(
                "🔁 outer loop complete: {} crosswalk stop(s), {:.1}s elapsed",
                st.stops,
                self.started.elapsed().as_secs_f64()
            );
            return (DriveState::AwaitingOuterLoopEnd, VelocityCommand::zero());
        }

        if let CrosswalkPhase::Stopped { counted } = st.crosswalk {
            if !counted {
                st.stops += 1;
                st.crosswalk = CrosswalkPhase::Stopped { counted: true };
                info!("🛑 stopped at crosswalk (episode {})", st.stops);
            }
            if self.gate.tick(frame) == GateDecision::Safe {
                info!("🚸 pedestrian clear; crossing");
                st.crosswalk = CrosswalkPhase::Crossing {
                    remaining: self.cfg.crosswalk.crossing_ticks,
                };
            }
            return (DriveState::OuterDrive(st), VelocityCommand::zero());
        }

        let mut cmd = self.classify(frame);

        // careful-driving band: close to a plate car, or recently so
        let in_band = features.blue_area >= self.cfg.plates.slow_area_lower
            && features.blue_area <= self.cfg.plates.slow_area_upper;
        if in_band {
            st.ticks_out_of_band = 0;
        } else {
            st.ticks_out_of_band = st.ticks_out_of_band.saturating_add(1);
        }
        let plate_eligible =
            in_band || st.ticks_out_of_band < self.cfg.plates.eligible_window_ticks;
        if plate_eligible {
            cmd.linear = careful(cmd.linear, self.cfg.plates.slow_x);
            cmd.angular = careful(cmd.angular, self.cfg.plates.slow_z);
        }

        if let CrosswalkPhase::Crossing { remaining } = &mut st.crosswalk {
            if cmd.linear > 0.0 {
                cmd.linear = self.cfg.crosswalk.crossing_x;
            }
            *remaining -= 1;
            if *remaining == 0 {
                debug!("crosswalk crossing deadline reached");
                st.crosswalk = CrosswalkPhase::Clear;
            }
        }

        if st.crosswalk == CrosswalkPhase::Clear
            && features.red_area > self.cfg.crosswalk.red_area_threshold
        {
            info!("🟥 red line close (area {}); stopping", features.red_area);
            self.gate.reset_episode();
            st.crosswalk = CrosswalkPhase::Stopped { counted: false };
            return (DriveState::OuterDrive(st), VelocityCommand::zero());
        }

        if plate_eligible {
            self.acquire_plate(frame);
        }

        (DriveState::OuterDrive(st), cmd)
    }

    fn finish_outer_loop(&mut self) -> (DriveState, VelocityCommand) {
        info!(
            "📊 resolving plates from {} observation(s)",
            self.aggregator.observation_count()
        );
        self.aggregator.finalize();
        self.results = Some(self.aggregator.report());
        (DriveState::Straightening, VelocityCommand::zero())
    }

    fn straighten_tick(&mut self, frame: &Frame) -> (DriveState, VelocityCommand) {
        let features = self.extractor.extract(frame);
        match self.straighten.step(&features.line) {
            StraightenOutcome::Aligned => {
                info!("📐 squared up with the transition line; turning in");
                (DriveState::TurningIntoInner, VelocityCommand::zero())
            }
            StraightenOutcome::Correcting(cmd) => (DriveState::Straightening, cmd),
            StraightenOutcome::Hold => {
                debug!("transition line lost; holding");
                (DriveState::Straightening, VelocityCommand::zero())
            }
        }
    }

    fn turn_tick(&mut self, frame: &Frame) -> (DriveState, VelocityCommand) {
        let features = self.extractor.extract(frame);
        if features.turn_blue_area > self.cfg.transition.turn_blue_area_threshold {
            info!(
                "↪️  inner loop in view (blue area {}); driving",
                features.turn_blue_area
            );
            return (DriveState::InnerDrive, VelocityCommand::zero());
        }
        (
            DriveState::TurningIntoInner,
            VelocityCommand::new(0.0, TURN_IN_RATE),
        )
    }

    // ── helpers ─────────────────────────────────────────────────────────

    fn outer_loop_done(&self, st: &OuterState) -> bool {
        matches!(st.crosswalk, CrosswalkPhase::Stopped { .. })
            && st.stops >= self.cfg.outer_loop.min_crosswalk_stops
            && self.started.elapsed().as_secs_f64() > self.cfg.outer_loop.min_secs
    }

    /// Classifier errors are never retried; the tick degrades to a zero
    /// command and the next frame gets a fresh chance.
    fn classify(&mut self, frame: &Frame) -> VelocityCommand {
        match self.classifier.classify(frame) {
            Ok(action) => action.command(self.cfg.drive.forward_x, self.cfg.drive.turn_z),
            Err(e) => {
                debug!("classifier failed on tick {}: {e:#}", self.tick);
                VelocityCommand::zero()
            }
        }
    }

    fn acquire_plate(&mut self, frame: &Frame) {
        match self.recognizer.recognize(frame) {
            Ok(Some(reading)) => {
                if let Some(plate) = reading.plate {
                    debug!(
                        "plate observation: {} -> {}",
                        reading.identifier, plate.text
                    );
                    self.aggregator.observe(&ObservationSample {
                        identifier: reading.identifier,
                        id_confidence: reading.id_confidence,
                        plate: plate.text,
                        plate_confidence: plate.char_confidence,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => debug!("recognizer failed on tick {}: {e:#}", self.tick),
        }
    }

    fn fire(&mut self, announcement: Announcement) {
        if let Err(e) = self.announcer.announce(&announcement) {
            warn!("announcement failed: {e:#}");
        }
    }
}
