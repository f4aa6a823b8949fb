//! Batched procedural gate tracks.
//!
//! [`TrackGenerator`] fills a padded [`GateSet`] row per requested slot: it picks
//! a gate count, places points by bounded rejection sampling, derives gate
//! headings from the blended edge angles, and can fit a Bezier loop through the
//! result on demand. Rows are only committed after they validate, so a failing
//! slot keeps its previous track and never blocks the rest of the batch.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::f32::consts::PI;
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::config::{ConfigError, RaceConfig, TrackConfig, TrackLayout, TrackSeeding};
use crate::constants::SPACING_TOLERANCE;
use crate::numbers::{i64_to_usize, u32_to_usize, usize_to_u32};
use crate::rng::{SlotRng, StreamTable, draw_integer};
use crate::slots::{ArgumentError, SlotIds};

pub mod curve;
pub mod geometry;

pub use curve::SampledCurve;
use geometry::{Point, Rotation, ccw_sort, min_loop_spacing, regular_polygon, rotation_from_heading};

/// Per-slot generation failure; the slot keeps its previous row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackError {
    #[error("slot {slot}: gate {gate} has a non-finite coordinate or heading")]
    NonFinite { slot: usize, gate: usize },
    #[error("slot {slot}: gates {gate} and its successor are {distance:.4} apart (minimum {min:.4})")]
    SpacingViolation {
        slot: usize,
        gate: usize,
        distance: f32,
        min: f32,
    },
    #[error("slot {slot}: {count} gates outside [{min}, {max}]")]
    CountOutOfBounds {
        slot: usize,
        count: usize,
        min: u32,
        max: u32,
    },
}

/// Padded gate geometry for every slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSet {
    capacity: usize,
    positions: Vec<Point>,
    headings: Vec<f32>,
    rotations: Vec<Rotation>,
    num_gates: Vec<u32>,
}

impl GateSet {
    /// Empty set: every slot has zero gates and zeroed padding.
    #[must_use]
    pub fn new(num_slots: usize, capacity: usize) -> Self {
        Self {
            capacity,
            positions: vec![[0.0, 0.0]; num_slots * capacity],
            headings: vec![0.0; num_slots * capacity],
            rotations: vec![[[0.0, 0.0], [0.0, 0.0]]; num_slots * capacity],
            num_gates: vec![0; num_slots],
        }
    }

    /// Build a single-slot set from explicit gates, bypassing generation.
    ///
    /// Useful for hosts with hand-authored courses and for scripted checks.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::LengthMismatch` when positions and headings differ in length.
    pub fn from_gates(positions: &[Point], headings: &[f32]) -> Result<Self, ArgumentError> {
        if positions.len() != headings.len() {
            return Err(ArgumentError::LengthMismatch {
                what: "headings",
                expected: positions.len(),
                actual: headings.len(),
            });
        }
        let mut set = Self::new(1, positions.len());
        set.write_row(0, positions, headings);
        Ok(set)
    }

    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.num_gates.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// # Panics
    ///
    /// Panics if `slot >= num_slots()`.
    #[must_use]
    pub fn num_gates(&self, slot: usize) -> u32 {
        self.num_gates[slot]
    }

    /// Gate counts for every slot.
    #[must_use]
    pub fn num_gates_all(&self) -> &[u32] {
        &self.num_gates
    }

    /// Valid gate positions for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= num_slots()`.
    #[must_use]
    pub fn positions(&self, slot: usize) -> &[Point] {
        let start = slot * self.capacity;
        &self.positions[start..start + u32_to_usize(self.num_gates[slot])]
    }

    /// Valid gate headings for `slot`. These face the approach side; see
    /// [`GateSet::travel_heading`] for the direction of travel.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= num_slots()`.
    #[must_use]
    pub fn headings(&self, slot: usize) -> &[f32] {
        let start = slot * self.capacity;
        &self.headings[start..start + u32_to_usize(self.num_gates[slot])]
    }

    /// Row-major `[slot][capacity]` positions including padding.
    #[must_use]
    pub fn padded_positions(&self) -> &[Point] {
        &self.positions
    }

    /// Row-major `[slot][capacity]` headings including padding. Each heading is
    /// the travel direction plus π; use [`GateSet::travel_heading`] for observations.
    #[must_use]
    pub fn padded_headings(&self) -> &[f32] {
        &self.headings
    }

    /// Row-major `[slot][capacity]` world-to-gate rotations including padding.
    #[must_use]
    pub fn padded_rotations(&self) -> &[Rotation] {
        &self.rotations
    }

    /// # Panics
    ///
    /// Panics if `slot` or `gate` lies outside the padded layout.
    #[must_use]
    pub fn position(&self, slot: usize, gate: usize) -> Point {
        self.positions[slot * self.capacity + gate]
    }

    /// Stored gate heading, opposite to [`GateSet::travel_heading`].
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `gate` lies outside the padded layout.
    #[must_use]
    pub fn heading(&self, slot: usize, gate: usize) -> f32 {
        self.headings[slot * self.capacity + gate]
    }

    /// # Panics
    ///
    /// Panics if `slot` or `gate` lies outside the padded layout.
    #[must_use]
    pub fn rotation(&self, slot: usize, gate: usize) -> &Rotation {
        &self.rotations[slot * self.capacity + gate]
    }

    /// Orientation of an agent crossing `gate` in the scoring direction.
    ///
    /// A gate's local +x axis points back toward the approach side, so a
    /// correct pass travels against it.
    #[must_use]
    pub fn travel_heading(&self, slot: usize, gate: usize) -> f32 {
        geometry::wrap_angle(self.heading(slot, gate) + PI)
    }

    /// Map a point from `gate`'s local frame to world coordinates.
    #[must_use]
    pub fn gate_to_world(&self, slot: usize, gate: usize, local: Point) -> Point {
        geometry::to_world(self.rotation(slot, gate), self.position(slot, gate), local)
    }

    /// XxHash64 over the valid part of a slot's row.
    #[must_use]
    pub fn fingerprint(&self, slot: usize) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write_u32(self.num_gates[slot]);
        for (position, heading) in self.positions(slot).iter().zip(self.headings(slot)) {
            hasher.write_u32(position[0].to_bits());
            hasher.write_u32(position[1].to_bits());
            hasher.write_u32(heading.to_bits());
        }
        hasher.finish()
    }

    /// Replace a slot's row wholesale; unused capacity is zeroed.
    pub(crate) fn write_row(&mut self, slot: usize, positions: &[Point], headings: &[f32]) {
        let range = slot * self.capacity..(slot + 1) * self.capacity;
        let used = positions.len().min(self.capacity);
        let row_positions = &mut self.positions[range.clone()];
        row_positions[..used].copy_from_slice(&positions[..used]);
        row_positions[used..].fill([0.0, 0.0]);
        let row_headings = &mut self.headings[range.clone()];
        row_headings[..used].copy_from_slice(&headings[..used]);
        row_headings[used..].fill(0.0);
        let row_rotations = &mut self.rotations[range];
        for (rotation, &heading) in row_rotations.iter_mut().zip(&headings[..used]) {
            *rotation = rotation_from_heading(heading);
        }
        row_rotations[used..].fill([[0.0, 0.0], [0.0, 0.0]]);
        self.num_gates[slot] = usize_to_u32(used);
    }
}

/// One slot's freshly generated gates, committed only after validation.
#[derive(Debug, Clone)]
struct TrackRow {
    positions: Vec<Point>,
    headings: Vec<f32>,
    attempts: u32,
    fell_back: bool,
}

/// Outcome of a batched generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Slots whose rows were replaced.
    pub committed: SmallVec<[usize; 16]>,
    /// Committed slots that exhausted rejection sampling and used the fallback loop.
    pub fallbacks: SmallVec<[usize; 4]>,
    /// Slots left untouched, with the reason.
    pub failures: Vec<TrackError>,
}

impl GenerationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Running totals kept by a generator across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub tracks_generated: u64,
    pub placement_attempts: u64,
    pub fallbacks: u64,
    pub failures: u64,
}

/// Batched gate-track generator.
#[derive(Debug, Clone)]
pub struct TrackGenerator {
    config: TrackConfig,
    seeding: TrackSeeding,
    stats: GenerationStats,
}

impl TrackGenerator {
    /// # Errors
    ///
    /// Returns `ConfigError` when the track configuration is invalid.
    pub fn new(config: TrackConfig, seeding: TrackSeeding) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            seeding,
            stats: GenerationStats::default(),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when the course configuration is invalid.
    pub fn from_race_config(config: &RaceConfig) -> Result<Self, ConfigError> {
        Self::new(config.track.clone(), config.seeding())
    }

    #[must_use]
    pub const fn config(&self) -> &TrackConfig {
        &self.config
    }

    #[must_use]
    pub const fn seeding(&self) -> TrackSeeding {
        self.seeding
    }

    #[must_use]
    pub const fn stats(&self) -> GenerationStats {
        self.stats
    }

    /// Capacity a [`GateSet`] needs for this configuration.
    #[must_use]
    pub fn capacity(&self) -> usize {
        u32_to_usize(self.config.max_num_points)
    }

    /// An empty gate set sized for this generator.
    #[must_use]
    pub fn empty_gate_set(&self, num_slots: usize) -> GateSet {
        GateSet::new(num_slots, self.capacity())
    }

    /// Regenerate the rows of exactly the slots named in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for duplicate or out-of-range ids, or when the
    /// stream table and gate set disagree on slot count or capacity. Nothing is
    /// mutated in that case. Per-slot failures are reported, not returned.
    pub fn generate(
        &mut self,
        streams: &mut StreamTable,
        gates: &mut GateSet,
        ids: &[u32],
    ) -> Result<GenerationReport, ArgumentError> {
        if streams.len() != gates.num_slots() {
            return Err(ArgumentError::LengthMismatch {
                what: "stream table",
                expected: gates.num_slots(),
                actual: streams.len(),
            });
        }
        if gates.capacity() < self.capacity() {
            return Err(ArgumentError::LengthMismatch {
                what: "gate capacity",
                expected: self.capacity(),
                actual: gates.capacity(),
            });
        }
        let selection = SlotIds::new(ids, gates.num_slots())?;
        let mut report = GenerationReport::default();
        for slot in selection.iter() {
            self.apply_seeding(streams, slot);
            let row = self.generate_row(streams.stream_mut(slot));
            self.commit_row(gates, slot, &row, &mut report);
        }
        debug!(
            "generated {} tracks ({} fallbacks, {} failures)",
            report.committed.len(),
            report.fallbacks.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Fit and sample the Bezier loop for each named slot.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for duplicate or out-of-range ids.
    pub fn sample_curves(&self, gates: &GateSet, ids: &[u32]) -> Result<SampledCurve, ArgumentError> {
        let selection = SlotIds::new(ids, gates.num_slots())?;
        let per_segment = u32_to_usize(self.config.samples_per_segment);
        let mut curves = SampledCurve::new(gates.num_slots(), gates.capacity() * per_segment);
        for slot in selection.iter() {
            let gate_count = u32_to_usize(gates.num_gates(slot));
            let travel: Vec<f32> = (0..gate_count)
                .map(|gate| gates.travel_heading(slot, gate))
                .collect();
            let samples = curve::sample_loop(
                gates.positions(slot),
                &travel,
                self.config.rad,
                self.config.samples_per_segment,
            );
            curves.write_row(slot, &samples);
        }
        Ok(curves)
    }

    fn apply_seeding(&self, streams: &mut StreamTable, slot: usize) {
        match self.seeding {
            TrackSeeding::Fresh => {}
            TrackSeeding::FixedPerSlot(track_id) => {
                streams.reseed(slot, fixed_slot_seed(track_id, slot));
            }
            TrackSeeding::Shared(track_id) => streams.reseed(slot, track_id),
        }
    }

    fn generate_row(&self, rng: &mut SlotRng) -> TrackRow {
        let lo = i64::from(self.config.min_num_points);
        let hi = i64::from(self.config.max_num_points) + 1;
        let count = i64_to_usize(draw_integer(rng, lo, hi));

        let (mut unit_points, attempts, fell_back) = match self.config.layout {
            TrackLayout::RegularPolygon => (regular_polygon(count), 0, false),
            TrackLayout::RandomLoop => self.place_points(rng, count),
        };
        let travel = geometry::travel_headings(&unit_points, self.config.edgy);
        let headings = travel
            .iter()
            .map(|&angle| geometry::wrap_angle(angle + PI))
            .collect();
        let scale = self.config.scale;
        for point in &mut unit_points {
            point[0] = (point[0] - 0.5) * scale;
            point[1] = (point[1] - 0.5) * scale;
        }
        TrackRow {
            positions: unit_points,
            headings,
            attempts,
            fell_back,
        }
    }

    /// Bounded rejection sampling in the unit square.
    fn place_points(&self, rng: &mut SlotRng, count: usize) -> (Vec<Point>, u32, bool) {
        let mut candidate: Vec<Point> = Vec::with_capacity(count);
        for attempt in 1..=self.config.max_attempts {
            candidate.clear();
            candidate.extend((0..count).map(|_| {
                let x = crate::rng::draw_uniform(rng, 0.0, 1.0);
                let y = crate::rng::draw_uniform(rng, 0.0, 1.0);
                [x, y]
            }));
            ccw_sort(&mut candidate);
            if min_loop_spacing(&candidate) >= self.config.min_point_distance {
                return (candidate, attempt, false);
            }
        }
        (regular_polygon(count), self.config.max_attempts, true)
    }

    /// Write `row` into `slot` if it validates; otherwise record the failure and
    /// leave the slot's previous row in place.
    fn commit_row(
        &mut self,
        gates: &mut GateSet,
        slot: usize,
        row: &TrackRow,
        report: &mut GenerationReport,
    ) {
        self.stats.placement_attempts += u64::from(row.attempts);
        match self.validate_row(slot, row) {
            Ok(()) => {
                gates.write_row(slot, &row.positions, &row.headings);
                self.stats.tracks_generated += 1;
                report.committed.push(slot);
                if row.fell_back {
                    self.stats.fallbacks += 1;
                    report.fallbacks.push(slot);
                    warn!(
                        "slot {slot}: no valid placement after {} attempts, using regular layout",
                        row.attempts
                    );
                }
            }
            Err(err) => {
                self.stats.failures += 1;
                warn!("{err}; keeping previous track");
                report.failures.push(err);
            }
        }
    }

    fn validate_row(&self, slot: usize, row: &TrackRow) -> Result<(), TrackError> {
        let count = row.positions.len();
        let (min, max) = (self.config.min_num_points, self.config.max_num_points);
        if count < u32_to_usize(min) || count > u32_to_usize(max) {
            return Err(TrackError::CountOutOfBounds {
                slot,
                count,
                min,
                max,
            });
        }
        for (gate, (position, heading)) in row.positions.iter().zip(&row.headings).enumerate() {
            if !(position[0].is_finite() && position[1].is_finite() && heading.is_finite()) {
                return Err(TrackError::NonFinite { slot, gate });
            }
        }
        let min_spacing =
            self.config.min_point_distance * self.config.scale * (1.0 - SPACING_TOLERANCE);
        for gate in 0..count {
            let spacing = geometry::distance(row.positions[gate], row.positions[(gate + 1) % count]);
            if spacing < min_spacing {
                return Err(TrackError::SpacingViolation {
                    slot,
                    gate,
                    distance: spacing,
                    min: min_spacing,
                });
            }
        }
        Ok(())
    }
}

/// Per-slot seed for fixed tracks, stable across resets.
fn fixed_slot_seed(track_id: u32, slot: usize) -> u32 {
    let mut hasher = XxHash64::with_seed(u64::from(track_id));
    hasher.write_u32(usize_to_u32(slot));
    let [a, b, c, d, ..] = hasher.finish().to_le_bytes();
    u32::from_le_bytes([a, b, c, d])
}
