use anyhow::{Context, Result, anyhow, ensure};
use gaterace_core::{RaceConfig, RaceCourse, StreamTable, TRACK_STREAM_DOMAIN};

use crate::common::scenario::TestScenario;
use crate::logic::{DriverKind, EpisodeRecord, ResetScope, SimulationPlan, SimulationSummary};

/// Relative slack when comparing world-space spacing against the configured minimum.
const SPACING_SLACK: f32 = 1e-3;

pub fn catalog_scenarios() -> Vec<(&'static str, TestScenario)> {
    vec![
        (
            "smoke",
            TestScenario::simulation(
                "Smoke Test",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_expectation(gate_count_expectation)
                    .with_expectation(single_lap_expectation),
            ),
        ),
        (
            "gate-count-bounds",
            TestScenario::simulation(
                "Gate Count Bounds",
                idle_plan().with_episodes(3).with_expectation(gate_count_expectation),
            ),
        ),
        (
            "min-spacing",
            TestScenario::simulation(
                "Minimum Gate Spacing",
                idle_plan()
                    .with_episodes(3)
                    .with_setup(tight_spacing_setup)
                    .with_expectation(spacing_expectation),
            ),
        ),
        (
            "curve-fit",
            TestScenario::simulation(
                "Curve Fit Through Gates",
                idle_plan().with_expectation(curve_fit_expectation),
            ),
        ),
        (
            "shared-track",
            TestScenario::simulation(
                "Shared Track",
                idle_plan()
                    .with_episodes(2)
                    .with_setup(shared_track_setup)
                    .with_expectation(shared_track_expectation),
            ),
        ),
        (
            "fixed-track-stable",
            TestScenario::simulation(
                "Fixed Track Per Slot",
                idle_plan()
                    .with_episodes(3)
                    .with_setup(fixed_track_setup)
                    .with_expectation(fixed_track_expectation),
            ),
        ),
        (
            "fresh-tracks",
            TestScenario::simulation(
                "Fresh Tracks Per Reset",
                idle_plan()
                    .with_episodes(2)
                    .with_expectation(fresh_track_expectation),
            ),
        ),
        (
            "reset-isolation",
            TestScenario::simulation(
                "Partial Reset Isolation",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_episodes(3)
                    .with_reset_scope(ResetScope::Subset(vec![0]))
                    .with_expectation(reset_isolation_expectation),
            ),
        ),
        (
            "crossing-script",
            TestScenario::simulation(
                "Centerline Crossing",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_expectation(single_lap_expectation)
                    .with_expectation(clean_crossing_expectation),
            ),
        ),
        (
            "lap-count",
            TestScenario::simulation(
                "Two Lap Termination",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_setup(two_lap_setup)
                    .with_expectation(lap_count_expectation),
            ),
        ),
        (
            "looping",
            TestScenario::simulation(
                "Looping Course",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_max_steps(96)
                    .with_setup(looping_setup)
                    .with_expectation(looping_expectation),
            ),
        ),
        (
            "wide-miss",
            TestScenario::simulation(
                "Wide Pass Misses",
                SimulationPlan::new(DriverKind::Wide)
                    .with_max_steps(8)
                    .with_expectation(wide_miss_expectation),
            ),
        ),
        (
            "random-spawn",
            TestScenario::simulation(
                "Random Spawn Gate",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_setup(random_spawn_setup)
                    .with_expectation(single_lap_expectation)
                    .with_expectation(spawn_range_expectation),
            ),
        ),
        (
            "rng-independence",
            TestScenario::simulation(
                "Stream Independence",
                idle_plan().with_expectation(stream_independence_expectation),
            ),
        ),
        (
            "determinism",
            TestScenario::simulation(
                "Deterministic Replay",
                SimulationPlan::new(DriverKind::Centerline)
                    .with_episodes(2)
                    .with_replay()
                    .with_expectation(replay_expectation),
            ),
        ),
    ]
}

fn idle_plan() -> SimulationPlan {
    SimulationPlan::new(DriverKind::Idle).with_max_steps(0)
}

fn tight_spacing_setup(config: &mut RaceConfig) {
    config.track.min_num_points = 6;
    config.track.max_num_points = 10;
    config.track.min_point_distance = 0.25;
}

fn shared_track_setup(config: &mut RaceConfig) {
    config.same_track_for_all_envs = true;
}

fn fixed_track_setup(config: &mut RaceConfig) {
    config.fixed_track_id = Some(7);
    config.same_track_for_all_envs = false;
}

fn two_lap_setup(config: &mut RaceConfig) {
    config.passage.num_laps = 2;
    config.passage.looping = false;
}

fn looping_setup(config: &mut RaceConfig) {
    config.passage.looping = true;
    config.passage.num_laps = 1;
}

fn random_spawn_setup(config: &mut RaceConfig) {
    config.passage.spawn_at_random_gate = true;
}

fn rebuild_course(summary: &SimulationSummary) -> Result<RaceCourse> {
    RaceCourse::new(summary.config.clone(), summary.num_envs, summary.seed)
        .with_context(|| format!("rebuilding course for seed {}", summary.seed))
}

fn first_episode(summary: &SimulationSummary) -> Result<&EpisodeRecord> {
    summary.first().ok_or_else(|| anyhow!("plan recorded no episodes"))
}

fn last_episode(summary: &SimulationSummary) -> Result<&EpisodeRecord> {
    summary.last().ok_or_else(|| anyhow!("plan recorded no episodes"))
}

fn gate_count_expectation(summary: &SimulationSummary) -> Result<()> {
    let (min, max) = (
        summary.config.track.min_num_points,
        summary.config.track.max_num_points,
    );
    for (episode, record) in summary.episodes.iter().enumerate() {
        for (slot, &count) in record.gate_counts.iter().enumerate() {
            ensure!(
                (min..=max).contains(&count),
                "episode {episode} slot {slot}: {count} gates outside [{min}, {max}]"
            );
        }
        ensure!(record.failures == 0, "episode {episode}: {} generation failures", record.failures);
    }
    Ok(())
}

fn spacing_expectation(summary: &SimulationSummary) -> Result<()> {
    let track = &summary.config.track;
    let floor = track.min_point_distance * track.scale * (1.0 - SPACING_SLACK);
    for (episode, record) in summary.episodes.iter().enumerate() {
        for (slot, &spacing) in record.min_spacing.iter().enumerate() {
            ensure!(
                spacing >= floor,
                "episode {episode} slot {slot}: spacing {spacing:.4} below {floor:.4}"
            );
        }
    }
    Ok(())
}

fn curve_fit_expectation(summary: &SimulationSummary) -> Result<()> {
    let course = rebuild_course(summary)?;
    let ids: Vec<u32> = (0..summary.num_envs)
        .map(|slot| u32::try_from(slot).unwrap_or(u32::MAX))
        .collect();
    let curves = course.sample_curves(&ids)?;
    let per_segment = usize::try_from(summary.config.track.samples_per_segment)?;
    for slot in 0..summary.num_envs {
        let gates = course.gates().positions(slot);
        let points = curves.points(slot);
        ensure!(
            points.len() == gates.len() * per_segment,
            "slot {slot}: {} curve samples for {} gates",
            points.len(),
            gates.len()
        );
        for (gate, position) in gates.iter().enumerate() {
            let sample = points[gate * per_segment];
            ensure!(
                (sample[0] - position[0]).abs() < 1e-4 && (sample[1] - position[1]).abs() < 1e-4,
                "slot {slot}: segment {gate} starts at {sample:?}, gate is at {position:?}"
            );
        }
        ensure!(
            points.iter().all(|p| p[0].is_finite() && p[1].is_finite()),
            "slot {slot}: non-finite curve sample"
        );
    }
    Ok(())
}

fn shared_track_expectation(summary: &SimulationSummary) -> Result<()> {
    for (episode, record) in summary.episodes.iter().enumerate() {
        let Some(first) = record.fingerprints.first() else {
            continue;
        };
        for (slot, fingerprint) in record.fingerprints.iter().enumerate() {
            ensure!(
                fingerprint == first,
                "episode {episode}: slot {slot} track differs from slot 0"
            );
        }
    }
    Ok(())
}

fn fixed_track_expectation(summary: &SimulationSummary) -> Result<()> {
    let first = first_episode(summary)?;
    for (episode, record) in summary.episodes.iter().enumerate().skip(1) {
        ensure!(
            record.fingerprints == first.fingerprints,
            "episode {episode}: fixed tracks changed after reset"
        );
    }
    Ok(())
}

fn fresh_track_expectation(summary: &SimulationSummary) -> Result<()> {
    let first = first_episode(summary)?;
    let last = last_episode(summary)?;
    ensure!(
        first
            .fingerprints
            .iter()
            .zip(&last.fingerprints)
            .any(|(a, b)| a != b),
        "no slot received a new track after reset"
    );
    Ok(())
}

fn reset_isolation_expectation(summary: &SimulationSummary) -> Result<()> {
    let first = first_episode(summary)?;
    for (episode, record) in summary.episodes.iter().enumerate().skip(1) {
        for slot in 1..summary.num_envs {
            ensure!(
                record.fingerprints[slot] == first.fingerprints[slot],
                "episode {episode}: resetting slot 0 changed slot {slot}"
            );
        }
    }
    Ok(())
}

fn single_lap_expectation(summary: &SimulationSummary) -> Result<()> {
    let record = last_episode(summary)?;
    for slot in 0..summary.num_envs {
        ensure!(
            record.terminated[slot],
            "slot {slot}: no termination after {} steps",
            record.steps
        );
        ensure!(
            record.laps_completed[slot] == summary.config.passage.num_laps,
            "slot {slot}: {} laps completed",
            record.laps_completed[slot]
        );
    }
    Ok(())
}

fn clean_crossing_expectation(summary: &SimulationSummary) -> Result<()> {
    let record = last_episode(summary)?;
    for slot in 0..summary.num_envs {
        ensure!(record.missed[slot] == 0, "slot {slot}: centreline pass was missed");
        let expected = record.gate_counts[slot] * summary.config.passage.num_laps;
        ensure!(
            record.reached[slot] == expected,
            "slot {slot}: reached {} gates, expected {expected}",
            record.reached[slot]
        );
    }
    Ok(())
}

fn lap_count_expectation(summary: &SimulationSummary) -> Result<()> {
    let record = last_episode(summary)?;
    for slot in 0..summary.num_envs {
        ensure!(
            record.laps_completed[slot] == 2,
            "slot {slot}: {} laps instead of 2",
            record.laps_completed[slot]
        );
        ensure!(record.terminated[slot], "slot {slot}: termination not requested");
    }
    Ok(())
}

fn looping_expectation(summary: &SimulationSummary) -> Result<()> {
    let record = last_episode(summary)?;
    for slot in 0..summary.num_envs {
        ensure!(!record.terminated[slot], "slot {slot}: looping course terminated");
        ensure!(
            record.laps_completed[slot] >= 2,
            "slot {slot}: only {} laps in {} steps",
            record.laps_completed[slot],
            record.steps
        );
    }
    Ok(())
}

fn wide_miss_expectation(summary: &SimulationSummary) -> Result<()> {
    let record = last_episode(summary)?;
    for slot in 0..summary.num_envs {
        ensure!(record.reached[slot] == 0, "slot {slot}: wide pass was scored");
        ensure!(record.missed[slot] > 0, "slot {slot}: wide pass was not flagged");
    }
    Ok(())
}

fn spawn_range_expectation(summary: &SimulationSummary) -> Result<()> {
    let course = rebuild_course(summary)?;
    for slot in 0..summary.num_envs {
        let start = course.progress().start_index()[slot];
        let count = course.gates().num_gates(slot);
        ensure!(start < count, "slot {slot}: spawn gate {start} of {count}");
    }
    Ok(())
}

fn stream_independence_expectation(summary: &SimulationSummary) -> Result<()> {
    let mut table = StreamTable::new(summary.num_envs, summary.seed, TRACK_STREAM_DOMAIN);
    let pristine = table.clone();
    table.sample_uniform(0.0, 1.0, &[16], &[0])?;
    for slot in 1..summary.num_envs {
        ensure!(
            table.stream(slot) == pristine.stream(slot),
            "drawing from slot 0 moved slot {slot}"
        );
    }
    let mut replay = pristine.clone();
    let a = replay.sample_normal(0.0, 1.0, &[8], &[0])?;
    let mut again = pristine;
    let b = again.sample_normal(0.0, 1.0, &[8], &[0])?;
    ensure!(a == b, "same seed produced different draws");
    Ok(())
}

fn replay_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.replay_matches == Some(true),
        "replaying seed {} diverged",
        summary.seed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::CourseRunner;

    #[test]
    fn catalog_keys_are_unique() {
        let scenarios = catalog_scenarios();
        let mut keys: Vec<&str> = scenarios.iter().map(|(key, _)| *key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), scenarios.len());
    }

    #[test]
    fn every_scenario_passes_for_a_fixed_seed() {
        let runner = CourseRunner::new(RaceConfig::default(), 4, false);
        for (key, scenario) in catalog_scenarios() {
            let summary = runner.run_plan(&scenario.plan, 1337).unwrap();
            for expectation in &scenario.plan.expectations {
                expectation
                    .evaluate(&summary)
                    .unwrap_or_else(|err| panic!("{key}: {err:#}"));
            }
        }
    }
}
