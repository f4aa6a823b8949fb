//! Centralized defaults and tuning constants for track generation and gate tracking.
//!
//! Configuration structs fall back to these values for any field missing from
//! a JSON document, so a bare `{}` always describes a valid course.

// Track generation ---------------------------------------------------------
pub(crate) const DEFAULT_TRACK_SCALE: f32 = 10.0;
pub(crate) const DEFAULT_MIN_POINT_DISTANCE: f32 = 0.1;
pub(crate) const DEFAULT_MIN_NUM_POINTS: u32 = 4;
pub(crate) const DEFAULT_MAX_NUM_POINTS: u32 = 8;
pub(crate) const DEFAULT_CURVE_RAD: f32 = 0.2;
pub(crate) const DEFAULT_CURVE_EDGY: f32 = 0.0;
pub(crate) const DEFAULT_SAMPLES_PER_SEGMENT: u32 = 20;
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 200;

/// Smallest loop the generator accepts; a single gate has no closing edge.
pub(crate) const MIN_GATES_PER_TRACK: u32 = 2;
/// Upper bound on gates per track, keeps padded rows bounded.
pub(crate) const MAX_GATES_PER_TRACK: u32 = 256;
/// Relative slack applied when re-checking spacing after scaling to world units.
pub(crate) const SPACING_TOLERANCE: f32 = 1e-4;

// Gate passage -------------------------------------------------------------
pub(crate) const DEFAULT_GATE_WIDTH: f32 = 0.75;
pub(crate) const DEFAULT_NUM_LAPS: u32 = 1;
/// Depth of the before/after bands along the gate axis, in world units.
pub(crate) const GATE_BAND_DEPTH: f32 = 1.0;

// Seeding ------------------------------------------------------------------
pub(crate) const DEFAULT_SHARED_TRACK_ID: u32 = 0;
pub(crate) const TRACK_STREAM_DOMAIN: &[u8] = b"gaterace.track";
pub(crate) const SPAWN_STREAM_DOMAIN: &[u8] = b"gaterace.spawn";
