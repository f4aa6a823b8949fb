//! Owning facade over the stream tables, generator, gate set and tracker.
use log::debug;
use thiserror::Error;

use crate::config::{ConfigError, RaceConfig};
use crate::constants::{SPAWN_STREAM_DOMAIN, TRACK_STREAM_DOMAIN};
use crate::gates::{AgentPose, GateEvents, GatePassageTracker, GateProgress, PassageState};
use crate::numbers::usize_to_u32;
use crate::rng::StreamTable;
use crate::slots::{ArgumentError, SlotIds};
use crate::track::{GateSet, GenerationReport, GenerationStats, SampledCurve, TrackGenerator};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CourseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Argument(#[from] ArgumentError),
}

/// A batch of independent race courses, one per slot.
///
/// Track regeneration for a reset batch always completes before the tracker
/// sees the new gates.
#[derive(Debug, Clone)]
pub struct RaceCourse {
    config: RaceConfig,
    track_streams: StreamTable,
    spawn_streams: StreamTable,
    generator: TrackGenerator,
    gates: GateSet,
    tracker: GatePassageTracker,
}

impl RaceCourse {
    /// Build `num_slots` courses and generate every slot's first track.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Config` when the configuration is invalid.
    pub fn new(config: RaceConfig, num_slots: usize, seed: u32) -> Result<Self, CourseError> {
        config.validate()?;
        let generator = TrackGenerator::from_race_config(&config)?;
        let tracker = GatePassageTracker::new(num_slots, config.passage.clone())?;
        let mut course = Self {
            track_streams: StreamTable::new(num_slots, seed, TRACK_STREAM_DOMAIN),
            spawn_streams: StreamTable::new(num_slots, seed, SPAWN_STREAM_DOMAIN),
            gates: generator.empty_gate_set(num_slots),
            generator,
            tracker,
            config,
        };
        debug!(
            "race course: {num_slots} slots, seed {seed}, seeding {:?}",
            course.generator.seeding()
        );
        course.reset_all()?;
        Ok(course)
    }

    /// Regenerate and restart every slot.
    ///
    /// # Errors
    ///
    /// Propagates `ArgumentError` from [`RaceCourse::reset`].
    pub fn reset_all(&mut self) -> Result<GenerationReport, ArgumentError> {
        let ids: Vec<u32> = (0..self.num_slots()).map(usize_to_u32).collect();
        self.reset(&ids)
    }

    /// Regenerate the named slots' tracks, then restart their progress.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for duplicate or out-of-range ids; no slot changes.
    pub fn reset(&mut self, ids: &[u32]) -> Result<GenerationReport, ArgumentError> {
        SlotIds::new(ids, self.num_slots())?;
        let report = self
            .generator
            .generate(&mut self.track_streams, &mut self.gates, ids)?;
        self.tracker
            .reset(&self.gates, &mut self.spawn_streams, ids)?;
        Ok(report)
    }

    /// Restart the named slots on their current tracks.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for duplicate or out-of-range ids.
    pub fn reset_progress(&mut self, ids: &[u32]) -> Result<(), ArgumentError> {
        self.tracker
            .reset(&self.gates, &mut self.spawn_streams, ids)
    }

    /// Reseed both the track and spawn streams of the named slots.
    ///
    /// Takes effect at the next reset of those slots.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` when lengths differ or an id is invalid; no slot changes.
    pub fn reseed(&mut self, seeds: &[u32], ids: &[u32]) -> Result<(), ArgumentError> {
        if seeds.len() != ids.len() {
            return Err(ArgumentError::LengthMismatch {
                what: "seeds",
                expected: ids.len(),
                actual: seeds.len(),
            });
        }
        SlotIds::new(ids, self.num_slots())?;
        self.track_streams.set_seeds(seeds, ids)?;
        self.spawn_streams.set_seeds(seeds, ids)
    }

    /// Feed one pose per slot through the passage tracker.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::LengthMismatch` unless there is exactly one pose per slot.
    pub fn step(&mut self, poses: &[AgentPose]) -> Result<&GateEvents, ArgumentError> {
        if poses.len() != self.num_slots() {
            return Err(ArgumentError::LengthMismatch {
                what: "poses",
                expected: self.num_slots(),
                actual: poses.len(),
            });
        }
        Ok(self.tracker.update(&self.gates, poses))
    }

    /// Bezier samples for the named slots.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for duplicate or out-of-range ids.
    pub fn sample_curves(&self, ids: &[u32]) -> Result<SampledCurve, ArgumentError> {
        self.generator.sample_curves(&self.gates, ids)
    }

    /// World position of the gate `slot` is pursuing; `None` once the loop is
    /// closed or when `slot` is out of range.
    #[must_use]
    pub fn target_gate(&self, slot: usize) -> Option<[f32; 2]> {
        if slot >= self.num_slots() {
            return None;
        }
        match self.tracker.state(slot) {
            PassageState::Pursuing(gate) if self.gates.num_gates(slot) > gate => {
                Some(self.gates.position(slot, crate::numbers::u32_to_usize(gate)))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.gates.num_slots()
    }

    #[must_use]
    pub const fn config(&self) -> &RaceConfig {
        &self.config
    }

    #[must_use]
    pub const fn gates(&self) -> &GateSet {
        &self.gates
    }

    #[must_use]
    pub const fn tracker(&self) -> &GatePassageTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn progress(&self) -> &GateProgress {
        self.tracker.progress()
    }

    #[must_use]
    pub const fn events(&self) -> &GateEvents {
        self.tracker.events()
    }

    #[must_use]
    pub const fn generation_stats(&self) -> GenerationStats {
        self.generator.stats()
    }

    #[must_use]
    pub const fn track_streams(&self) -> &StreamTable {
        &self.track_streams
    }

    #[must_use]
    pub const fn spawn_streams(&self) -> &StreamTable {
        &self.spawn_streams
    }
}
