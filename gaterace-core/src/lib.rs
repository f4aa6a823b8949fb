//! Gaterace Core
//!
//! Batched procedural gate tracks for parallel simulation slots: per-slot
//! seeded random streams, a track generator producing padded gate loops with
//! fitted Bezier curves, and a gate-passage state machine with lap counting.
//! The crate exposes plain numeric arrays and has no physics or rendering
//! dependencies.

pub mod config;
mod constants;
pub mod course;
pub mod gates;
pub mod numbers;
pub mod rng;
pub mod slots;
pub mod track;

// Re-export commonly used types
pub use config::{ConfigError, PassageConfig, RaceConfig, TrackConfig, TrackLayout, TrackSeeding};
pub use course::{CourseError, RaceCourse};
pub use gates::{
    AgentPose, GateEvents, GatePassageTracker, GateProgress, GateSide, PassageState, classify,
};
pub use rng::{CountingRng, SlotRng, StreamTable};
pub use slots::{ArgumentError, SlotIds};
pub use track::geometry::{Point, Rotation, wrap_angle};
pub use track::{
    GateSet, GenerationReport, GenerationStats, SampledCurve, TrackError, TrackGenerator,
};

/// Domain tag for track-generation streams.
pub const TRACK_STREAM_DOMAIN: &[u8] = constants::TRACK_STREAM_DOMAIN;
/// Domain tag for spawn-gate streams.
pub const SPAWN_STREAM_DOMAIN: &[u8] = constants::SPAWN_STREAM_DOMAIN;
