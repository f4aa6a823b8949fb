//! Gate-passage state machine with lap counting.
//!
//! Each slot pursues one gate at a time. The agent's position is projected into
//! the target gate's local frame every step; a pass is scored when the agent
//! moves from the band in front of the gate (`0 < x < 1`) to the band behind it
//! (`-1 < x < 0`) while staying inside the lateral window.
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PassageConfig};
use crate::constants::GATE_BAND_DEPTH;
use crate::numbers::{i64_to_usize, u32_to_usize, usize_to_u32};
use crate::rng::{StreamTable, draw_integer};
use crate::slots::{ArgumentError, SlotIds};
use crate::track::GateSet;
use crate::track::geometry::{Point, to_local, wrap_angle};

/// Planar agent pose supplied by the host every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

impl AgentPose {
    #[must_use]
    pub const fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }

    #[must_use]
    pub const fn position(&self) -> Point {
        [self.x, self.y]
    }
}

/// Per-slot passage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassageState {
    /// Approaching the gate with this index.
    Pursuing(u32),
    /// Every required lap is done; the slot waits for a reset.
    LoopClosed,
}

impl Default for PassageState {
    fn default() -> Self {
        Self::Pursuing(0)
    }
}

/// Where a point sits relative to a gate, in the gate's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateSide {
    Before,
    After,
    /// Behind the gate plane but outside the lateral window.
    Missed,
    Outside,
}

/// Classify a gate-local point against bands of depth [`GATE_BAND_DEPTH`].
#[must_use]
pub fn classify(local: Point, half_width: f32) -> GateSide {
    let [x, y] = local;
    let inside = y.abs() < half_width;
    if x > 0.0 && x < GATE_BAND_DEPTH && inside {
        GateSide::Before
    } else if x < 0.0 && x > -GATE_BAND_DEPTH {
        if inside { GateSide::After } else { GateSide::Missed }
    } else {
        GateSide::Outside
    }
}

/// Mutable per-slot progress, stored as parallel arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateProgress {
    target_index: Vec<u32>,
    laps_completed: Vec<u32>,
    trajectory_completed: Vec<bool>,
    previous_is_before_gate: Vec<bool>,
    previous_is_after_gate: Vec<bool>,
    missed_gate: Vec<bool>,
    gates_passed: Vec<u32>,
    start_index: Vec<u32>,
}

impl GateProgress {
    fn new(num_slots: usize) -> Self {
        Self {
            target_index: vec![0; num_slots],
            laps_completed: vec![0; num_slots],
            trajectory_completed: vec![false; num_slots],
            previous_is_before_gate: vec![false; num_slots],
            previous_is_after_gate: vec![false; num_slots],
            missed_gate: vec![false; num_slots],
            gates_passed: vec![0; num_slots],
            start_index: vec![0; num_slots],
        }
    }

    fn reset_slot(&mut self, slot: usize, start: u32) {
        self.target_index[slot] = start;
        self.start_index[slot] = start;
        self.laps_completed[slot] = 0;
        self.gates_passed[slot] = 0;
        self.trajectory_completed[slot] = false;
        self.previous_is_before_gate[slot] = false;
        self.previous_is_after_gate[slot] = false;
        self.missed_gate[slot] = false;
    }

    #[must_use]
    pub fn target_index(&self) -> &[u32] {
        &self.target_index
    }

    #[must_use]
    pub fn laps_completed(&self) -> &[u32] {
        &self.laps_completed
    }

    #[must_use]
    pub fn trajectory_completed(&self) -> &[bool] {
        &self.trajectory_completed
    }

    #[must_use]
    pub fn previous_is_before_gate(&self) -> &[bool] {
        &self.previous_is_before_gate
    }

    #[must_use]
    pub fn previous_is_after_gate(&self) -> &[bool] {
        &self.previous_is_after_gate
    }

    /// Set once the slot has missed its target since the last reset.
    #[must_use]
    pub fn missed_gate(&self) -> &[bool] {
        &self.missed_gate
    }

    /// Reached events since the last reset.
    #[must_use]
    pub fn gates_passed(&self) -> &[u32] {
        &self.gates_passed
    }

    #[must_use]
    pub fn start_index(&self) -> &[u32] {
        &self.start_index
    }
}

/// Transition events and per-step measurements for every slot.
///
/// Event flags describe only the most recent `update`; they are cleared at the
/// start of each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvents {
    pub reached: Vec<bool>,
    pub reversed: Vec<bool>,
    pub missed: Vec<bool>,
    pub lap_completed: Vec<bool>,
    pub termination_requested: Vec<bool>,
    /// Agent position in the target gate's frame.
    pub local_position: Vec<Point>,
    pub distance_to_gate: Vec<f32>,
    /// Agent heading relative to the target gate's travel heading, wrapped.
    pub heading_error: Vec<f32>,
}

impl GateEvents {
    fn new(num_slots: usize) -> Self {
        Self {
            reached: vec![false; num_slots],
            reversed: vec![false; num_slots],
            missed: vec![false; num_slots],
            lap_completed: vec![false; num_slots],
            termination_requested: vec![false; num_slots],
            local_position: vec![[0.0, 0.0]; num_slots],
            distance_to_gate: vec![0.0; num_slots],
            heading_error: vec![0.0; num_slots],
        }
    }

    fn clear_slot(&mut self, slot: usize) {
        self.reached[slot] = false;
        self.reversed[slot] = false;
        self.missed[slot] = false;
        self.lap_completed[slot] = false;
        self.termination_requested[slot] = false;
        self.local_position[slot] = [0.0, 0.0];
        self.distance_to_gate[slot] = 0.0;
        self.heading_error[slot] = 0.0;
    }

    /// Slots that raised any transition on the last step.
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.reached.len()).filter(|&slot| {
            self.reached[slot] || self.reversed[slot] || self.missed[slot]
        })
    }
}

/// Batched gate-passage tracker.
#[derive(Debug, Clone)]
pub struct GatePassageTracker {
    config: PassageConfig,
    states: Vec<PassageState>,
    progress: GateProgress,
    events: GateEvents,
}

impl GatePassageTracker {
    /// # Errors
    ///
    /// Returns `ConfigError` when the passage configuration is invalid.
    pub fn new(num_slots: usize, config: PassageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            states: vec![PassageState::default(); num_slots],
            progress: GateProgress::new(num_slots),
            events: GateEvents::new(num_slots),
        })
    }

    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn config(&self) -> &PassageConfig {
        &self.config
    }

    /// # Panics
    ///
    /// Panics if `slot >= num_slots()`.
    #[must_use]
    pub fn state(&self, slot: usize) -> PassageState {
        self.states[slot]
    }

    #[must_use]
    pub const fn progress(&self) -> &GateProgress {
        &self.progress
    }

    #[must_use]
    pub const fn events(&self) -> &GateEvents {
        &self.events
    }

    /// Put the named slots back on their start gate.
    ///
    /// The start gate is 0, or a uniform draw from the slot's spawn stream when
    /// `spawn_at_random_gate` is set.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for invalid ids or when `gates` or `spawn` are
    /// sized for a different number of slots. Nothing is mutated in that case.
    pub fn reset(
        &mut self,
        gates: &GateSet,
        spawn: &mut StreamTable,
        ids: &[u32],
    ) -> Result<(), ArgumentError> {
        self.check_gate_set(gates)?;
        if spawn.len() != self.num_slots() {
            return Err(ArgumentError::LengthMismatch {
                what: "spawn streams",
                expected: self.num_slots(),
                actual: spawn.len(),
            });
        }
        let selection = SlotIds::new(ids, self.num_slots())?;
        for slot in selection.iter() {
            let gate_count = gates.num_gates(slot);
            let start = if self.config.spawn_at_random_gate && gate_count > 0 {
                let draw = draw_integer(spawn.stream_mut(slot), 0, i64::from(gate_count));
                usize_to_u32(i64_to_usize(draw))
            } else {
                0
            };
            self.progress.reset_slot(slot, start);
            self.events.clear_slot(slot);
            self.states[slot] = PassageState::Pursuing(start);
        }
        Ok(())
    }

    /// Advance every slot by one step.
    ///
    /// Slots without gates and slots in [`PassageState::LoopClosed`] only have
    /// their events cleared.
    pub fn update(&mut self, gates: &GateSet, poses: &[AgentPose]) -> &GateEvents {
        debug_assert_eq!(poses.len(), self.num_slots(), "one pose per slot");
        debug_assert_eq!(gates.num_slots(), self.num_slots(), "gate set slot count");
        let slots = self.num_slots().min(poses.len()).min(gates.num_slots());
        for slot in 0..slots {
            self.update_slot(gates, slot, &poses[slot]);
        }
        &self.events
    }

    fn update_slot(&mut self, gates: &GateSet, slot: usize, pose: &AgentPose) {
        self.events.clear_slot(slot);
        let gate_count = gates.num_gates(slot);
        let PassageState::Pursuing(target) = self.states[slot] else {
            return;
        };
        if gate_count == 0 {
            return;
        }
        let target = target % gate_count;
        let half_width = self.config.gate_width * 0.5;
        let target_gate = u32_to_usize(target);
        let local = gate_local(gates, slot, target_gate, pose);
        let side = classify(local, half_width);

        self.events.local_position[slot] = local;
        self.events.distance_to_gate[slot] = local[0].hypot(local[1]);
        self.events.heading_error[slot] =
            wrap_angle(pose.heading - gates.travel_heading(slot, target_gate));

        if side == GateSide::Missed {
            self.events.missed[slot] = true;
            self.progress.missed_gate[slot] = true;
        }

        let was_before = self.progress.previous_is_before_gate[slot];
        let was_after = self.progress.previous_is_after_gate[slot];
        if was_before && side == GateSide::After {
            self.events.reached[slot] = true;
            self.advance(gates, slot, pose, target, gate_count);
            return;
        }
        if was_after && side == GateSide::Before {
            self.events.reversed[slot] = true;
        }
        self.progress.previous_is_before_gate[slot] = side == GateSide::Before;
        self.progress.previous_is_after_gate[slot] = side == GateSide::After;
    }

    fn advance(
        &mut self,
        gates: &GateSet,
        slot: usize,
        pose: &AgentPose,
        target: u32,
        gate_count: u32,
    ) {
        let passed = self.progress.gates_passed[slot].saturating_add(1);
        self.progress.gates_passed[slot] = passed;
        let next = (target + 1) % gate_count;
        self.progress.target_index[slot] = next;

        if passed % gate_count == 0 {
            self.events.lap_completed[slot] = true;
            self.progress.laps_completed[slot] += 1;
            if !self.config.looping && self.progress.laps_completed[slot] >= self.config.num_laps {
                self.events.termination_requested[slot] = true;
                self.progress.trajectory_completed[slot] = true;
                self.progress.previous_is_before_gate[slot] = false;
                self.progress.previous_is_after_gate[slot] = false;
                self.states[slot] = PassageState::LoopClosed;
                return;
            }
        }

        self.states[slot] = PassageState::Pursuing(next);
        // Fresh target: re-derive the flags from where the agent is now.
        let side = classify(
            gate_local(gates, slot, u32_to_usize(next), pose),
            self.config.gate_width * 0.5,
        );
        self.progress.previous_is_before_gate[slot] = side == GateSide::Before;
        self.progress.previous_is_after_gate[slot] = side == GateSide::After;
    }

    fn check_gate_set(&self, gates: &GateSet) -> Result<(), ArgumentError> {
        if gates.num_slots() == self.num_slots() {
            Ok(())
        } else {
            Err(ArgumentError::LengthMismatch {
                what: "gate set",
                expected: self.num_slots(),
                actual: gates.num_slots(),
            })
        }
    }
}

fn gate_local(gates: &GateSet, slot: usize, gate: usize, pose: &AgentPose) -> Point {
    to_local(gates.rotation(slot, gate), gates.position(slot, gate), pose.position())
}
