use anyhow::{Context, Result};
use gaterace_core::{AgentPose, GateSet, RaceConfig, RaceCourse};
use std::sync::Arc;

/// Scripted pilot used to drive every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Alternates between the front and back band of the target gate, on its centreline.
    Centerline,
    /// Same rhythm as `Centerline` but a full gate width to the side.
    Wide,
    /// Holds position at the world origin.
    Idle,
}

impl DriverKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Centerline => "centerline",
            Self::Wide => "wide",
            Self::Idle => "idle",
        }
    }
}

/// Which slots are regenerated between episodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    All,
    Subset(Vec<u32>),
}

/// Declarative plan for running a batch of courses.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub driver: DriverKind,
    pub episodes: usize,
    pub max_steps: Option<usize>,
    pub reset_scope: ResetScope,
    pub replay: bool,
    pub setup: Option<fn(&mut RaceConfig)>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(driver: DriverKind) -> Self {
        Self {
            driver,
            episodes: 1,
            max_steps: None,
            reset_scope: ResetScope::All,
            replay: false,
            setup: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub fn with_reset_scope(mut self, scope: ResetScope) -> Self {
        self.reset_scope = scope;
        self
    }

    #[must_use]
    pub const fn with_replay(mut self) -> Self {
        self.replay = true;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: fn(&mut RaceConfig)) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a plan completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Per-slot measurements for one episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeRecord {
    pub gate_counts: Vec<u32>,
    pub fingerprints: Vec<u64>,
    pub min_spacing: Vec<f32>,
    pub reached: Vec<u32>,
    pub reversed: Vec<u32>,
    pub missed: Vec<u32>,
    pub laps_completed: Vec<u32>,
    pub terminated: Vec<bool>,
    pub fallbacks: u64,
    pub failures: u64,
    pub steps: usize,
}

impl EpisodeRecord {
    fn new(gates: &GateSet) -> Self {
        let n = gates.num_slots();
        Self {
            gate_counts: gates.num_gates_all().to_vec(),
            fingerprints: (0..n).map(|slot| gates.fingerprint(slot)).collect(),
            min_spacing: (0..n).map(|slot| loop_spacing(gates, slot)).collect(),
            reached: vec![0; n],
            reversed: vec![0; n],
            missed: vec![0; n],
            laps_completed: vec![0; n],
            terminated: vec![false; n],
            ..Self::default()
        }
    }
}

/// Complete record of a plan run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u32,
    pub num_envs: usize,
    pub driver: DriverKind,
    pub config: RaceConfig,
    pub episodes: Vec<EpisodeRecord>,
    /// Whether a second run from the same seed matched, when the plan asked for one.
    pub replay_matches: Option<bool>,
}

impl SimulationSummary {
    #[must_use]
    pub fn first(&self) -> Option<&EpisodeRecord> {
        self.episodes.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&EpisodeRecord> {
        self.episodes.last()
    }
}

/// Runs plans against freshly built courses.
#[derive(Debug, Clone)]
pub struct CourseRunner {
    base: RaceConfig,
    num_envs: usize,
    verbose: bool,
}

impl CourseRunner {
    #[must_use]
    pub const fn new(base: RaceConfig, num_envs: usize, verbose: bool) -> Self {
        Self {
            base,
            num_envs,
            verbose,
        }
    }

    #[must_use]
    pub const fn num_envs(&self) -> usize {
        self.num_envs
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Resolve the configuration a plan runs with.
    #[must_use]
    pub fn config_for(&self, plan: &SimulationPlan) -> RaceConfig {
        let mut config = self.base.clone();
        if let Some(setup) = plan.setup {
            setup(&mut config);
        }
        config
    }

    pub fn run_plan(&self, plan: &SimulationPlan, seed: u32) -> Result<SimulationSummary> {
        let config = self.config_for(plan);
        let episodes = self.run_episodes(plan, &config, seed)?;
        let replay_matches = if plan.replay {
            Some(self.run_episodes(plan, &config, seed)? == episodes)
        } else {
            None
        };
        Ok(SimulationSummary {
            seed,
            num_envs: self.num_envs,
            driver: plan.driver,
            config,
            episodes,
            replay_matches,
        })
    }

    fn run_episodes(
        &self,
        plan: &SimulationPlan,
        config: &RaceConfig,
        seed: u32,
    ) -> Result<Vec<EpisodeRecord>> {
        let mut course = RaceCourse::new(config.clone(), self.num_envs, seed)
            .with_context(|| format!("building {} courses for seed {seed}", self.num_envs))?;
        let mut records = Vec::with_capacity(plan.episodes);
        for episode in 0..plan.episodes {
            let stats_before = course.generation_stats();
            if episode > 0 {
                let ids = match &plan.reset_scope {
                    ResetScope::All => (0..self.num_envs)
                        .map(|slot| u32::try_from(slot).unwrap_or(u32::MAX))
                        .collect(),
                    ResetScope::Subset(ids) => ids.clone(),
                };
                course
                    .reset(&ids)
                    .with_context(|| format!("resetting episode {episode}"))?;
            }
            let stats_after = course.generation_stats();
            let mut record = EpisodeRecord::new(course.gates());
            if episode > 0 {
                record.fallbacks = stats_after.fallbacks - stats_before.fallbacks;
                record.failures = stats_after.failures - stats_before.failures;
            } else {
                record.fallbacks = stats_after.fallbacks;
                record.failures = stats_after.failures;
            }
            self.drive(plan, config, &mut course, &mut record)?;
            if self.verbose {
                log::info!(
                    "seed {seed} episode {episode}: {} steps, laps {:?}",
                    record.steps,
                    record.laps_completed
                );
            }
            records.push(record);
        }
        Ok(records)
    }

    fn drive(
        &self,
        plan: &SimulationPlan,
        config: &RaceConfig,
        course: &mut RaceCourse,
        record: &mut EpisodeRecord,
    ) -> Result<()> {
        let laps = usize::try_from(config.passage.num_laps).unwrap_or(1);
        let max_steps = plan
            .max_steps
            .unwrap_or(2 * course.gates().capacity() * laps + 4);
        for step in 0..max_steps {
            let poses: Vec<AgentPose> = (0..self.num_envs)
                .map(|slot| pilot_pose(plan.driver, course, slot, step))
                .collect();
            let events = course.step(&poses)?;
            for slot in 0..self.num_envs {
                record.reached[slot] += u32::from(events.reached[slot]);
                record.reversed[slot] += u32::from(events.reversed[slot]);
                record.missed[slot] += u32::from(events.missed[slot]);
                record.terminated[slot] |= events.termination_requested[slot];
            }
            record.steps = step + 1;
            if record.terminated.iter().all(|done| *done) {
                break;
            }
        }
        record
            .laps_completed
            .copy_from_slice(course.progress().laps_completed());
        Ok(())
    }
}

fn pilot_pose(driver: DriverKind, course: &RaceCourse, slot: usize, step: usize) -> AgentPose {
    let lateral = match driver {
        DriverKind::Idle => return AgentPose::default(),
        DriverKind::Centerline => 0.0,
        DriverKind::Wide => course.config().passage.gate_width,
    };
    let gates = course.gates();
    if gates.num_gates(slot) == 0 {
        return AgentPose::default();
    }
    let target = usize::try_from(course.progress().target_index()[slot]).unwrap_or(0);
    let along = if step % 2 == 0 { 0.5 } else { -0.5 };
    let world = gates.gate_to_world(slot, target, [along, lateral]);
    AgentPose::new(world[0], world[1], gates.travel_heading(slot, target))
}

fn loop_spacing(gates: &GateSet, slot: usize) -> f32 {
    let positions = gates.positions(slot);
    (0..positions.len())
        .map(|i| {
            let a = positions[i];
            let b = positions[(i + 1) % positions.len()];
            (b[0] - a[0]).hypot(b[1] - a[1])
        })
        .fold(f32::INFINITY, f32::min)
}
