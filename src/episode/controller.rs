//! Episode controller: the reset/step state machine around one simulator
//! session.
//!
//! ```text
//! Uninitialized --reset--> Ready --step--> Stepping --step--> Stepping
//!                            ^                 |
//!                            |              terminal
//!                          reset               v
//!                            +------------ Terminated
//! ```
//!
//! A simulator fault during `reset` or `step` drops the controller back to
//! `Uninitialized`; the session state is unknown afterwards. Out-of-range
//! telemetry is such a fault, except on a crash frame: damage alone decides
//! a crash, so that step still ends the episode with the terminal penalty.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::GearshiftConfig;
use crate::episode::action::{Action, ActionSpace};
use crate::error::{ContractViolation, EnvError, SimulatorOp};
use crate::observation::{Observation, ObservationBuilder, ObservationSpace};
use crate::reward::{compute_reward, RewardBreakdown, RewardState};
use crate::sim::{Controls, Simulator};
use crate::telemetry::TelemetryReader;
use crate::termination::{check_crash, check_termination, TerminationReason};

/// Lifecycle state of an [`EpisodeController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No episode has been started, or the last one ended in a fault.
    Uninitialized,
    /// Reset completed; no step taken yet.
    Ready,
    /// At least one non-terminal step taken.
    Stepping,
    /// The last step hit a terminal condition; only `reset` is allowed.
    Terminated,
}

/// Per-episode mutable state. Cleared on every reset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EpisodeState {
    pub previous_speed: f64,
    pub previous_acceleration: f64,
    pub step_count: usize,
}

impl EpisodeState {
    fn reward_state(&self) -> RewardState {
        RewardState {
            previous_speed: self.previous_speed,
            previous_acceleration: self.previous_acceleration,
        }
    }
}

/// Diagnostic record attached to every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub damage: f64,
    /// Speed in km/h.
    pub speed: f64,
    pub rpm: f64,
    pub gear: i32,
    pub clutch: f64,
    pub throttle: f64,
    /// Speed delta since the previous step.
    pub acceleration: f64,
    /// Optional sensor fields that were absent and defaulted to zero.
    pub defaulted: Vec<&'static str>,
}

impl StepInfo {
    fn new(obs: &Observation, damage: f64, acceleration: f64) -> Self {
        Self {
            damage,
            speed: obs.speed,
            rpm: obs.rpm,
            gear: obs.gear,
            clutch: obs.clutch_input,
            throttle: obs.throttle_input,
            acceleration,
            defaulted: obs.defaulted.names(),
        }
    }

    /// The record as a string-keyed map with a stable key set.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("damage".into(), json!(self.damage));
        map.insert("speed".into(), json!(self.speed));
        map.insert("rpm".into(), json!(self.rpm));
        map.insert("gear".into(), json!(self.gear));
        map.insert("clutch".into(), json!(self.clutch));
        map.insert("throttle".into(), json!(self.throttle));
        map.insert("acceleration".into(), json!(self.acceleration));
        map.insert("defaulted".into(), json!(self.defaulted));
        map
    }
}

/// Result of one [`EpisodeController::step`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    /// The episode ended on its own (crash or stall).
    pub terminated: bool,
    /// The episode was cut short from outside. Never set by the controller.
    pub truncated: bool,
    pub reason: Option<TerminationReason>,
    pub breakdown: RewardBreakdown,
    pub info: StepInfo,
}

impl StepOutcome {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Drives one simulator session through reset/step episodes.
///
/// The controller owns its session exclusively. Every operation takes
/// `&mut self`, so at most one round trip is ever in flight.
pub struct EpisodeController<S: Simulator> {
    sim: S,
    config: GearshiftConfig,
    reader: TelemetryReader,
    builder: ObservationBuilder,
    action_space: ActionSpace,
    state: ControllerState,
    episode: EpisodeState,
    episode_index: u64,
}

impl<S: Simulator> EpisodeController<S> {
    /// Wrap a simulator session. The configuration is copied and fixed for
    /// the controller's lifetime.
    pub fn new(sim: S, config: &GearshiftConfig) -> Self {
        Self {
            sim,
            config: config.clone(),
            reader: TelemetryReader::new(),
            builder: ObservationBuilder::from_config(&config.observation),
            action_space: ActionSpace::new(config.observation.low_gear, config.observation.high_gear),
            state: ControllerState::Uninitialized,
            episode: EpisodeState::default(),
            episode_index: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn episode_state(&self) -> &EpisodeState {
        &self.episode
    }

    /// Number of successful resets so far; the running episode's index.
    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    pub fn observation_space(&self) -> &ObservationSpace {
        self.builder.space()
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    pub fn config(&self) -> &GearshiftConfig {
        &self.config
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    pub fn into_simulator(self) -> S {
        self.sim
    }

    /// Restart the scenario and return the initial observation.
    ///
    /// Valid from every state.
    pub async fn reset(&mut self) -> Result<Observation, EnvError> {
        self.state = ControllerState::Uninitialized;

        self.sim
            .restart_episode()
            .await
            .map_err(|e| EnvError::simulator(SimulatorOp::Restart, e))?;
        self.reader.reset();
        self.episode = EpisodeState::default();

        let frame = self.reader.read(&mut self.sim).await?;
        let obs = self.builder.build(&frame)?;

        self.episode_index += 1;
        self.state = ControllerState::Ready;
        tracing::info!(
            episode = self.episode_index,
            speed = obs.speed,
            rpm = obs.rpm,
            gear = obs.gear,
            "episode reset"
        );
        if obs.defaulted.any() {
            tracing::debug!(fields = ?obs.defaulted.names(), "sensor fields defaulted to zero");
        }
        Ok(obs)
    }

    /// Apply one action and advance the simulation by one step.
    pub async fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        match self.state {
            ControllerState::Uninitialized => return Err(ContractViolation::StepBeforeReset.into()),
            ControllerState::Terminated => {
                return Err(ContractViolation::StepAfterTermination.into())
            }
            ControllerState::Ready | ControllerState::Stepping => {}
        }

        let controls = self.action_space.to_controls(&action)?;

        match self.transition(controls).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.state = ControllerState::Uninitialized;
                tracing::error!(
                    episode = self.episode_index,
                    step = self.episode.step_count,
                    error = %err,
                    "step aborted by simulator fault"
                );
                Err(err)
            }
        }
    }

    /// Disconnect from the simulator. The controller must be reset before
    /// further use.
    pub async fn close(&mut self) -> Result<(), EnvError> {
        self.state = ControllerState::Uninitialized;
        self.sim
            .close()
            .await
            .map_err(|e| EnvError::simulator(SimulatorOp::Close, e))
    }

    async fn transition(&mut self, controls: Controls) -> Result<StepOutcome, EnvError> {
        self.sim
            .apply_controls(controls)
            .await
            .map_err(|e| EnvError::simulator(SimulatorOp::ApplyControls, e))?;
        self.sim
            .advance(self.config.simulator.ticks_per_step)
            .await
            .map_err(|e| EnvError::simulator(SimulatorOp::Advance, e))?;

        let frame = self.reader.read(&mut self.sim).await?;
        let obs = self.builder.convert(&frame);
        if let Err(err) = self.builder.space().check(&obs) {
            // A crash ends the episode whatever the other readings say.
            if check_crash(&self.config.termination, frame.damage).is_none() {
                return Err(err.into());
            }
            tracing::warn!(
                episode = self.episode_index,
                damage = frame.damage,
                error = %err,
                "out-of-range telemetry on crash frame"
            );
        }

        let outcome = compute_reward(
            &self.config.reward,
            &self.config.termination,
            &obs,
            frame.damage,
            self.episode.reward_state(),
        );
        let reason = check_termination(&self.config.termination, &obs, frame.damage);

        self.episode.previous_speed = outcome.state.previous_speed;
        self.episode.previous_acceleration = outcome.state.previous_acceleration;
        self.episode.step_count += 1;

        let info = StepInfo::new(&obs, frame.damage, outcome.acceleration());
        tracing::debug!(
            episode = self.episode_index,
            step = self.episode.step_count,
            reward = outcome.reward,
            speed = obs.speed,
            rpm = obs.rpm,
            gear = obs.gear,
            "step"
        );

        self.state = match reason {
            Some(reason) => {
                tracing::warn!(
                    episode = self.episode_index,
                    step = self.episode.step_count,
                    reason = %reason,
                    "episode terminated"
                );
                ControllerState::Terminated
            }
            None => ControllerState::Stepping,
        };

        Ok(StepOutcome {
            observation: obs,
            reward: outcome.reward,
            terminated: reason.is_some(),
            truncated: false,
            reason,
            breakdown: outcome.breakdown,
            info,
        })
    }
}
