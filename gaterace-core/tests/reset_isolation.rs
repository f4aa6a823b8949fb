use gaterace_core::{AgentPose, ArgumentError, RaceConfig, RaceCourse};

fn drive_all(course: &mut RaceCourse, steps: usize) {
    let n = course.num_slots();
    for step in 0..steps {
        let poses: Vec<AgentPose> = (0..n)
            .map(|slot| {
                let t = step as f32 * 0.1 + slot as f32;
                AgentPose::new(t.cos() * 3.0, t.sin() * 3.0, t)
            })
            .collect();
        course.step(&poses).unwrap();
    }
}

#[test]
fn resetting_one_slot_leaves_its_neighbour_untouched() {
    let mut course = RaceCourse::new(RaceConfig::default(), 8, 77).unwrap();
    drive_all(&mut course, 25);

    let neighbour = 4;
    let fingerprint = course.gates().fingerprint(neighbour);
    let stream = course.track_streams().stream(neighbour).cloned();
    let spawn = course.spawn_streams().stream(neighbour).cloned();
    let target = course.progress().target_index()[neighbour];
    let laps = course.progress().laps_completed()[neighbour];

    let report = course.reset(&[3]).unwrap();
    assert_eq!(report.committed.as_slice(), &[3]);

    assert_eq!(course.gates().fingerprint(neighbour), fingerprint);
    assert_eq!(course.track_streams().stream(neighbour).cloned(), stream);
    assert_eq!(course.spawn_streams().stream(neighbour).cloned(), spawn);
    assert_eq!(course.progress().target_index()[neighbour], target);
    assert_eq!(course.progress().laps_completed()[neighbour], laps);
}

#[test]
fn partial_resets_do_not_depend_on_batch_composition() {
    let mut solo = RaceCourse::new(RaceConfig::default(), 6, 5).unwrap();
    let mut batch = RaceCourse::new(RaceConfig::default(), 6, 5).unwrap();
    solo.reset(&[2]).unwrap();
    batch.reset(&[0, 5, 2, 1]).unwrap();
    assert_eq!(solo.gates().fingerprint(2), batch.gates().fingerprint(2));
}

#[test]
fn invalid_reset_changes_nothing() {
    let mut course = RaceCourse::new(RaceConfig::default(), 4, 9).unwrap();
    let fingerprints: Vec<u64> = (0..4).map(|slot| course.gates().fingerprint(slot)).collect();
    let streams = course.track_streams().clone();

    assert_eq!(
        course.reset(&[1, 2, 1]).unwrap_err(),
        ArgumentError::DuplicateSlot { slot: 1 }
    );
    assert!(matches!(
        course.reset(&[0, 4]),
        Err(ArgumentError::SlotOutOfRange { slot: 4, .. })
    ));

    let after: Vec<u64> = (0..4).map(|slot| course.gates().fingerprint(slot)).collect();
    assert_eq!(after, fingerprints);
    assert_eq!(course.track_streams(), &streams);
}

#[test]
fn reseeded_slots_replay_their_tracks() {
    let mut course = RaceCourse::new(RaceConfig::default(), 3, 0).unwrap();
    course.reseed(&[500], &[1]).unwrap();
    course.reset(&[1]).unwrap();
    let first = course.gates().fingerprint(1);
    course.reseed(&[500], &[1]).unwrap();
    course.reset(&[1]).unwrap();
    assert_eq!(course.gates().fingerprint(1), first);
}

#[test]
fn empty_reset_is_a_no_op() {
    let mut course = RaceCourse::new(RaceConfig::default(), 2, 3).unwrap();
    let before = course.gates().clone();
    let report = course.reset(&[]).unwrap();
    assert!(report.committed.is_empty());
    assert_eq!(course.gates(), &before);
}
