use std::f32::consts::PI;

use gaterace_core::{
    AgentPose, GatePassageTracker, GateSet, PassageConfig, PassageState, RaceConfig, RaceCourse,
    SPAWN_STREAM_DOMAIN, StreamTable, wrap_angle,
};

fn tracker_for(gates: &GateSet, config: PassageConfig) -> GatePassageTracker {
    let mut tracker = GatePassageTracker::new(gates.num_slots(), config).unwrap();
    let mut spawn = StreamTable::new(gates.num_slots(), 0, SPAWN_STREAM_DOMAIN);
    let ids: Vec<u32> = (0..gates.num_slots() as u32).collect();
    tracker.reset(gates, &mut spawn, &ids).unwrap();
    tracker
}

fn pose_in_gate_frame(gates: &GateSet, slot: usize, gate: usize, local: [f32; 2]) -> AgentPose {
    let world = gates.gate_to_world(slot, gate, local);
    AgentPose::new(world[0], world[1], gates.travel_heading(slot, gate))
}

#[test]
fn crossing_along_the_negative_axis_scores_the_gate() {
    let gates = GateSet::from_gates(&[[0.0, 0.0], [-6.0, 0.0], [-3.0, 5.0]], &[0.0, 2.0, -1.0])
        .unwrap();
    let mut tracker = tracker_for(&gates, PassageConfig::default());
    tracker.update(&gates, &[AgentPose::new(0.5, 0.0, PI)]);
    let events = tracker.update(&gates, &[AgentPose::new(-0.5, 0.0, PI)]);
    assert!(events.reached[0]);
    assert_eq!(tracker.progress().target_index()[0], 1);
    assert_eq!(tracker.progress().gates_passed()[0], 1);
}

#[test]
fn wide_pass_is_missed_not_reached() {
    let gates = GateSet::from_gates(&[[0.0, 0.0], [-6.0, 0.0]], &[0.0, PI]).unwrap();
    let mut tracker = tracker_for(&gates, PassageConfig::default());
    tracker.update(&gates, &[AgentPose::new(0.5, 1.0, PI)]);
    let events = tracker.update(&gates, &[AgentPose::new(-0.5, 1.0, PI)]);
    assert!(events.missed[0]);
    assert!(!events.reached[0]);
}

#[test]
fn generated_tracks_can_be_driven_for_two_laps() {
    let config = RaceConfig {
        passage: PassageConfig {
            num_laps: 2,
            ..PassageConfig::default()
        },
        ..RaceConfig::default()
    };
    let mut course = RaceCourse::new(config, 3, 17).unwrap();
    let slot = 1;
    let gate_count = course.gates().num_gates(slot) as usize;
    let mut terminated_at = None;
    for pass in 0..2 * gate_count {
        let gate = pass % gate_count;
        for local in [[0.5, 0.0], [-0.5, 0.0]] {
            let mut poses = vec![AgentPose::default(); 3];
            poses[slot] = pose_in_gate_frame(course.gates(), slot, gate, local);
            let events = course.step(&poses).unwrap();
            if events.termination_requested[slot] {
                terminated_at = Some(pass);
            }
        }
    }
    assert_eq!(terminated_at, Some(2 * gate_count - 1));
    assert_eq!(course.progress().laps_completed()[slot], 2);
    assert!(course.progress().trajectory_completed()[slot]);
    assert_eq!(course.tracker().state(slot), PassageState::LoopClosed);
    assert_eq!(course.progress().laps_completed()[0], 0);
    assert!(course.target_gate(slot).is_none());
}

#[test]
fn heading_error_is_zero_when_flying_the_travel_heading() {
    let mut course = RaceCourse::new(RaceConfig::default(), 1, 5).unwrap();
    let pose = pose_in_gate_frame(course.gates(), 0, 0, [0.5, 0.0]);
    let events = course.step(&[pose]).unwrap();
    assert!(events.heading_error[0].abs() < 1e-4);
    assert!((events.local_position[0][0] - 0.5).abs() < 1e-4);
    assert!((events.distance_to_gate[0] - 0.5).abs() < 1e-4);
}

#[test]
fn reset_progress_keeps_the_track() {
    let mut course = RaceCourse::new(RaceConfig::default(), 2, 8).unwrap();
    let track = course.gates().fingerprint(0);
    let before = pose_in_gate_frame(course.gates(), 0, 0, [0.5, 0.0]);
    let after = pose_in_gate_frame(course.gates(), 0, 0, [-0.5, 0.0]);
    course.step(&[before, AgentPose::default()]).unwrap();
    course.step(&[after, AgentPose::default()]).unwrap();
    assert_eq!(course.progress().target_index()[0], 1);
    course.reset_progress(&[0]).unwrap();
    assert_eq!(course.progress().target_index()[0], 0);
    assert_eq!(course.gates().fingerprint(0), track);
}

#[test]
fn random_spawn_uses_the_spawn_stream_only() {
    let config = RaceConfig {
        passage: PassageConfig {
            spawn_at_random_gate: true,
            ..PassageConfig::default()
        },
        ..RaceConfig::default()
    };
    let mut course = RaceCourse::new(config, 4, 30).unwrap();
    let track_draws = course.track_streams().draws(2);
    let spawn_before = course.spawn_streams().draws(2).unwrap_or_default();
    course.reset_progress(&[2]).unwrap();
    assert_eq!(course.track_streams().draws(2), track_draws);
    assert!(course.spawn_streams().draws(2).unwrap_or_default() > spawn_before);
    let start = course.progress().start_index()[2];
    assert!(start < course.gates().num_gates(2));
    assert_eq!(course.tracker().state(2), PassageState::Pursuing(start));
}

#[test]
fn travel_heading_opposes_gate_heading() {
    let course = RaceCourse::new(RaceConfig::default(), 1, 0).unwrap();
    let gates = course.gates();
    for gate in 0..gates.num_gates(0) as usize {
        let diff = wrap_angle(gates.travel_heading(0, gate) - gates.heading(0, gate));
        assert!((diff.abs() - PI).abs() < 1e-4);
    }
}

#[test]
fn identical_pose_streams_replay_identical_events() {
    let config = RaceConfig {
        passage: PassageConfig {
            spawn_at_random_gate: true,
            ..PassageConfig::default()
        },
        ..RaceConfig::default()
    };
    let mut first = RaceCourse::new(config.clone(), 4, 123).unwrap();
    let mut second = RaceCourse::new(config, 4, 123).unwrap();
    for step in 0..200_u16 {
        let t = f32::from(step) * 0.07;
        let poses: Vec<AgentPose> = (0..4_u8)
            .map(|slot| {
                let r = 2.0 + f32::from(slot);
                AgentPose::new(r * t.cos(), r * t.sin(), t + PI / 2.0)
            })
            .collect();
        let a = first.step(&poses).unwrap().clone();
        let b = second.step(&poses).unwrap();
        assert_eq!(&a, b, "step {step}");
    }
    assert_eq!(first.progress(), second.progress());
}
