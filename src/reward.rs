//! Driving-quality reward.
//!
//! [`compute_reward`] is a pure function: the only state it needs across
//! steps (previous speed and acceleration) is passed in and handed back as a
//! [`RewardState`], so it can be evaluated in isolation.
//!
//! Evaluation order, first match wins:
//! 1. crash (damage above threshold) → terminal penalty
//! 2. stall (rpm below threshold) → terminal penalty
//! 3. otherwise the sum of the shaping terms:
//!    - `speed * speed_weight`
//!    - `max(a, 0) * acceleration_weight + min(a, 0) * deceleration_weight`
//!      with `a = speed - previous_speed`
//!    - rpm band: flat bonus inside the band, `(rpm - high) / 1000 *
//!      overrev_penalty_per_krpm` subtracted above it, nothing below it
//!    - gear matching: bonus when `|gear - expected_gear(speed)|` is within
//!      tolerance, penalty otherwise
//!
//! The result is not clamped.

use serde::{Deserialize, Serialize};

use crate::config::{GearThreshold, RewardConfig, TerminationConfig};
use crate::observation::Observation;
use crate::termination::{check_termination, TerminationReason};

/// Cross-step reward state, threaded explicitly through every call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardState {
    /// Speed (km/h) at the previous step; zero at episode start.
    pub previous_speed: f64,
    /// Speed delta computed at the previous step.
    pub previous_acceleration: f64,
}

/// Per-term contributions to one reward value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RewardBreakdown {
    /// Set when a terminal condition short-circuited the shaping terms.
    pub terminal: Option<TerminationReason>,
    pub speed: f64,
    pub acceleration: f64,
    pub rpm_band: f64,
    pub gear: f64,
    /// Expected gear for the observed speed (zero when short-circuited).
    pub expected_gear: i32,
}

/// Result of one reward evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardOutcome {
    pub reward: f64,
    /// State to pass into the next evaluation.
    pub state: RewardState,
    pub breakdown: RewardBreakdown,
}

impl RewardOutcome {
    /// Speed delta of this step (`speed - previous_speed`).
    pub fn acceleration(&self) -> f64 {
        self.state.previous_acceleration
    }
}

/// Speed → expected gear step table.
#[derive(Debug, Clone, Copy)]
pub struct GearTable<'a> {
    thresholds: &'a [GearThreshold],
    fallback: i32,
}

impl<'a> GearTable<'a> {
    /// `thresholds` must be strictly increasing in `below_kmh`.
    pub fn new(thresholds: &'a [GearThreshold], fallback: i32) -> Self {
        Self {
            thresholds,
            fallback,
        }
    }

    pub fn from_config(config: &'a RewardConfig) -> Self {
        Self::new(&config.gear_table, config.fallback_gear)
    }

    /// Gear of the first row whose threshold lies above `speed_kmh`.
    pub fn expected_gear(&self, speed_kmh: f64) -> i32 {
        self.thresholds
            .iter()
            .find(|row| speed_kmh < row.below_kmh)
            .map_or(self.fallback, |row| row.gear)
    }
}

/// Evaluate the reward for one observation.
pub fn compute_reward(
    config: &RewardConfig,
    termination: &TerminationConfig,
    obs: &Observation,
    damage: f64,
    state: RewardState,
) -> RewardOutcome {
    let acceleration = obs.speed - state.previous_speed;
    let next_state = RewardState {
        previous_speed: obs.speed,
        previous_acceleration: acceleration,
    };

    if let Some(reason) = check_termination(termination, obs, damage) {
        return RewardOutcome {
            reward: config.terminal_penalty,
            state: next_state,
            breakdown: RewardBreakdown {
                terminal: Some(reason),
                ..RewardBreakdown::default()
            },
        };
    }

    let speed_term = obs.speed * config.speed_weight;

    let positive = acceleration.max(0.0);
    let negative = acceleration.min(0.0);
    let acceleration_term =
        positive * config.acceleration_weight + negative * config.deceleration_weight;

    let rpm_term = if obs.rpm >= config.rpm_band_low && obs.rpm <= config.rpm_band_high {
        config.rpm_band_bonus
    } else if obs.rpm > config.rpm_band_high {
        -(obs.rpm - config.rpm_band_high) / 1000.0 * config.overrev_penalty_per_krpm
    } else {
        0.0
    };

    let expected_gear = GearTable::from_config(config).expected_gear(obs.speed);
    let gear_term = if (obs.gear - expected_gear).abs() > config.gear_tolerance {
        -config.wrong_gear_penalty
    } else {
        config.right_gear_bonus
    };

    let breakdown = RewardBreakdown {
        terminal: None,
        speed: speed_term,
        acceleration: acceleration_term,
        rpm_band: rpm_term,
        gear: gear_term,
        expected_gear,
    };

    RewardOutcome {
        reward: speed_term + acceleration_term + rpm_term + gear_term,
        state: next_state,
        breakdown,
    }
}
