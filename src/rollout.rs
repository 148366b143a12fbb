//! Rollout driver: runs a driving policy inside a time-limited environment.
//!
//! The [`RolloutRunner`] drives episodes by repeatedly:
//!   1. asking the policy for an action given the current observation,
//!   2. stepping the environment,
//!   3. folding the step into the episode statistics,
//!
//! until the episode terminates (crash, stall) or is truncated by the time
//! limit. Each episode is summarised in an [`EpisodeRecord`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::episode::{Action, ActionSpace, StepInfo, TimeLimit};
use crate::observation::Observation;
use crate::sim::Simulator;
use crate::termination::TerminationReason;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Maps observations to actions.
pub trait DrivingPolicy {
    fn select_action(&mut self, obs: &Observation) -> Result<Action>;
}

impl<P: DrivingPolicy + ?Sized> DrivingPolicy for Box<P> {
    fn select_action(&mut self, obs: &Observation) -> Result<Action> {
        (**self).select_action(obs)
    }
}

/// Samples actions uniformly from the action space.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
    high_gear: f64,
}

impl RandomPolicy {
    pub fn new(seed: u64, space: &ActionSpace) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            high_gear: f64::from(space.high_gear),
        }
    }
}

impl DrivingPolicy for RandomPolicy {
    fn select_action(&mut self, _obs: &Observation) -> Result<Action> {
        Ok(Action::new(
            self.rng.gen_range(0.0..=1.0),
            self.rng.gen_range(0.0..=1.0),
            self.rng.gen_range(0.0..=self.high_gear),
        ))
    }
}

/// Always returns the same action.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    action: Action,
}

impl FixedPolicy {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

impl DrivingPolicy for FixedPolicy {
    fn select_action(&mut self, _obs: &Observation) -> Result<Action> {
        Ok(self.action)
    }
}

// ---------------------------------------------------------------------------
// Episode summaries
// ---------------------------------------------------------------------------

/// Per-episode means of the driving signals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub mean_throttle: f64,
    pub mean_clutch: f64,
    pub mean_rpm: f64,
    pub mean_gear: f64,
    pub mean_acceleration: f64,
    /// Highest speed seen in the episode, km/h.
    pub max_speed: f64,
    /// Damage at the last step.
    pub final_damage: f64,
}

#[derive(Debug, Clone, Default)]
struct StatsAccumulator {
    count: usize,
    throttle: f64,
    clutch: f64,
    rpm: f64,
    gear: f64,
    acceleration: f64,
    max_speed: f64,
    final_damage: f64,
}

impl StatsAccumulator {
    fn push(&mut self, info: &StepInfo) {
        self.count += 1;
        self.throttle += info.throttle;
        self.clutch += info.clutch;
        self.rpm += info.rpm;
        self.gear += f64::from(info.gear);
        self.acceleration += info.acceleration;
        self.max_speed = self.max_speed.max(info.speed);
        self.final_damage = info.damage;
    }

    fn finish(&self) -> EpisodeStats {
        if self.count == 0 {
            return EpisodeStats::default();
        }
        let n = self.count as f64;
        EpisodeStats {
            mean_throttle: self.throttle / n,
            mean_clutch: self.clutch / n,
            mean_rpm: self.rpm / n,
            mean_gear: self.gear / n,
            mean_acceleration: self.acceleration / n,
            max_speed: self.max_speed,
            final_damage: self.final_damage,
        }
    }
}

/// Summary of one finished episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Controller episode index (1-based).
    pub episode: u64,
    pub steps: usize,
    pub total_reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub reason: Option<TerminationReason>,
    pub stats: EpisodeStats,
}

impl EpisodeRecord {
    /// Short label of how the episode ended.
    pub fn outcome(&self) -> &'static str {
        match (&self.reason, self.truncated) {
            (Some(reason), _) => reason.name(),
            (None, true) => "truncated",
            (None, false) => "open",
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs whole episodes against a [`TimeLimit`]-wrapped controller.
#[derive(Debug, Clone, Default)]
pub struct RolloutRunner;

impl RolloutRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `num_episodes` episodes back to back.
    pub async fn run_episodes<S, P>(
        &self,
        env: &mut TimeLimit<S>,
        policy: &mut P,
        num_episodes: usize,
    ) -> Result<Vec<EpisodeRecord>>
    where
        S: Simulator,
        P: DrivingPolicy,
    {
        let mut records = Vec::with_capacity(num_episodes);
        for _ in 0..num_episodes {
            records.push(self.run_episode(env, policy).await?);
        }
        Ok(records)
    }

    /// Reset and drive one episode until it terminates or is truncated.
    ///
    /// Environment faults are returned as [`EnvError`](crate::error::EnvError)
    /// inside the `anyhow` chain.
    pub async fn run_episode<S, P>(
        &self,
        env: &mut TimeLimit<S>,
        policy: &mut P,
    ) -> Result<EpisodeRecord>
    where
        S: Simulator,
        P: DrivingPolicy,
    {
        let started_at = Utc::now();
        let mut obs = env.reset().await?;
        let episode = env.inner().episode_index();

        let mut stats = StatsAccumulator::default();
        let mut total_reward = 0.0;
        let mut steps = 0;
        let (terminated, truncated, reason) = loop {
            let action = policy.select_action(&obs)?;
            let outcome = env.step(action).await?;
            steps += 1;
            total_reward += outcome.reward;
            stats.push(&outcome.info);
            obs = outcome.observation;
            if outcome.done() {
                break (outcome.terminated, outcome.truncated, outcome.reason);
            }
        };

        let record = EpisodeRecord {
            id: Uuid::new_v4(),
            started_at,
            episode,
            steps,
            total_reward,
            terminated,
            truncated,
            reason,
            stats: stats.finish(),
        };

        tracing::info!(
            episode,
            steps,
            reward = total_reward,
            outcome = record.outcome(),
            mean_throttle = record.stats.mean_throttle,
            mean_clutch = record.stats.mean_clutch,
            mean_rpm = record.stats.mean_rpm,
            mean_gear = record.stats.mean_gear,
            mean_acceleration = record.stats.mean_acceleration,
            "episode finished"
        );
        Ok(record)
    }
}
