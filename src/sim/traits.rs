//! Simulator collaborator trait and the records that cross it.
//!
//! Every simulator session (live bridge, scripted replay, ...) implements the
//! [`Simulator`] trait so that the episode controller can drive it uniformly.

use serde::{Deserialize, Serialize};

/// Control setpoints forwarded to the vehicle once per step.
///
/// Steering and brake stay at zero: the task is straight-line longitudinal
/// control only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    pub throttle: f64,
    pub clutch: f64,
    pub gear: i32,
    pub steering: f64,
    pub brake: f64,
}

impl Controls {
    /// Build straight-line controls (steering and brake fixed at zero).
    pub fn longitudinal(throttle: f64, clutch: f64, gear: i32) -> Self {
        Self {
            throttle,
            clutch,
            gear,
            steering: 0.0,
            brake: 0.0,
        }
    }
}

/// One raw sensor sample as reported by the simulator.
///
/// `speed` is in the simulator's native unit (see
/// [`SpeedUnit`](crate::config::SpeedUnit)). The optional fields may be absent
/// on some vehicles; the observation builder substitutes zero for them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    pub speed: f64,
    pub rpm: Option<f64>,
    pub gear: Option<i32>,
    pub clutch_input: Option<f64>,
    pub throttle_input: Option<f64>,
    /// Accumulated damage, non-decreasing within an episode.
    pub damage: f64,
}

impl SensorFrame {
    /// A frame with every optional field present.
    pub fn complete(
        speed: f64,
        rpm: f64,
        gear: i32,
        clutch_input: f64,
        throttle_input: f64,
        damage: f64,
    ) -> Self {
        Self {
            speed,
            rpm: Some(rpm),
            gear: Some(gear),
            clutch_input: Some(clutch_input),
            throttle_input: Some(throttle_input),
            damage,
        }
    }
}

/// A stateful remote simulator session.
///
/// Calls are strictly sequential round trips: each method takes `&mut self`
/// and completes only once the simulator has answered.
#[allow(async_fn_in_trait)]
pub trait Simulator: Send {
    /// Restart the loaded scenario, putting the vehicle back at its spawn.
    async fn restart_episode(&mut self) -> anyhow::Result<()>;

    /// Forward control setpoints to the vehicle.
    async fn apply_controls(&mut self, controls: Controls) -> anyhow::Result<()>;

    /// Advance simulated time by `ticks` fixed steps.
    async fn advance(&mut self, ticks: u32) -> anyhow::Result<()>;

    /// Poll the vehicle sensors and return the latest sample.
    async fn read_sensors(&mut self) -> anyhow::Result<SensorFrame>;

    /// Release the session.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
