//! Step-count truncation wrapped around an [`EpisodeController`].

use crate::config::GearshiftConfig;
use crate::episode::action::Action;
use crate::episode::controller::{EpisodeController, StepOutcome};
use crate::error::EnvError;
use crate::observation::Observation;
use crate::sim::Simulator;

/// Truncates episodes after a fixed number of steps.
///
/// The step that reaches the limit is returned with `truncated = true`
/// unless it also terminated. A gymnasium-style `TimeLimit` would flag both;
/// here a terminal step is reported as terminated only. Stepping past the
/// limit is not blocked; the driver is expected to reset.
pub struct TimeLimit<S: Simulator> {
    inner: EpisodeController<S>,
    max_episode_steps: usize,
    elapsed: usize,
}

impl<S: Simulator> TimeLimit<S> {
    pub fn new(inner: EpisodeController<S>, max_episode_steps: usize) -> Self {
        Self {
            inner,
            max_episode_steps,
            elapsed: 0,
        }
    }

    /// Controller plus limit from one configuration.
    pub fn from_config(sim: S, config: &GearshiftConfig) -> Self {
        Self::new(
            EpisodeController::new(sim, config),
            config.episode.max_episode_steps,
        )
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    /// Steps taken since the last reset.
    pub fn elapsed_steps(&self) -> usize {
        self.elapsed
    }

    pub fn inner(&self) -> &EpisodeController<S> {
        &self.inner
    }

    pub fn into_inner(self) -> EpisodeController<S> {
        self.inner
    }

    pub async fn reset(&mut self) -> Result<Observation, EnvError> {
        self.elapsed = 0;
        self.inner.reset().await
    }

    pub async fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        let mut outcome = self.inner.step(action).await?;
        self.elapsed += 1;
        if self.elapsed >= self.max_episode_steps && !outcome.terminated {
            outcome.truncated = true;
            tracing::info!(
                episode = self.inner.episode_index(),
                steps = self.elapsed,
                "episode truncated by time limit"
            );
        }
        Ok(outcome)
    }

    pub async fn close(&mut self) -> Result<(), EnvError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scripted::ScriptedSimulator;
    use crate::sim::SensorFrame;

    fn cruising(limit: usize) -> TimeLimit<ScriptedSimulator> {
        let sim = ScriptedSimulator::with_episodes(vec![vec![SensorFrame::complete(
            20.0, 3000.0, 3, 0.0, 0.5, 0.0,
        )]]);
        let mut config = GearshiftConfig::default();
        config.episode.max_episode_steps = limit;
        TimeLimit::from_config(sim, &config)
    }

    #[tokio::test]
    async fn truncates_on_the_limit_step() {
        let mut env = cruising(3);
        env.reset().await.unwrap();
        let action = Action::new(0.5, 0.0, 3.0);

        for _ in 0..2 {
            let outcome = env.step(action).await.unwrap();
            assert!(!outcome.truncated);
            assert!(!outcome.terminated);
        }
        let outcome = env.step(action).await.unwrap();
        assert!(outcome.truncated);
        assert!(outcome.done());
        assert_eq!(env.elapsed_steps(), 3);
    }

    #[tokio::test]
    async fn reset_restarts_the_count() {
        let mut env = cruising(2);
        env.reset().await.unwrap();
        env.step(Action::new(0.5, 0.0, 3.0)).await.unwrap();
        env.reset().await.unwrap();
        assert_eq!(env.elapsed_steps(), 0);
        let outcome = env.step(Action::new(0.5, 0.0, 3.0)).await.unwrap();
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn termination_wins_over_truncation() {
        let sim = ScriptedSimulator::with_episodes(vec![vec![
            SensorFrame::complete(20.0, 3000.0, 3, 0.0, 0.5, 0.0),
            SensorFrame::complete(0.0, 50.0, 3, 0.0, 0.0, 0.0),
        ]]);
        let mut config = GearshiftConfig::default();
        config.episode.max_episode_steps = 1;
        let mut env = TimeLimit::from_config(sim, &config);
        env.reset().await.unwrap();
        let outcome = env.step(Action::new(0.0, 0.0, 3.0)).await.unwrap();
        assert!(outcome.terminated);
        assert!(!outcome.truncated);
    }
}
