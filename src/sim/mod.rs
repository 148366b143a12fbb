//! Simulator sessions.
//!
//! Every session implements the [`Simulator`] trait so that the episode
//! controller can drive it uniformly.
//!
//! Included sessions:
//! - **Bridge** ([`bridge`]) -- a live simulator reached through an HTTP bridge.
//! - **Scripted** ([`scripted`]) -- replays canned telemetry episodes, making it
//!   possible to run the full environment without a simulator.

pub mod bridge;
pub mod scripted;
pub mod traits;

pub use traits::{Controls, SensorFrame, Simulator};

/// An enum wrapper around the concrete sessions, enabling runtime selection
/// without `dyn` (which is incompatible with async trait methods).
pub enum AnySimulator {
    Bridge(bridge::BridgeSimulator),
    Scripted(scripted::ScriptedSimulator),
}

impl Simulator for AnySimulator {
    async fn restart_episode(&mut self) -> anyhow::Result<()> {
        match self {
            Self::Bridge(s) => s.restart_episode().await,
            Self::Scripted(s) => s.restart_episode().await,
        }
    }

    async fn apply_controls(&mut self, controls: Controls) -> anyhow::Result<()> {
        match self {
            Self::Bridge(s) => s.apply_controls(controls).await,
            Self::Scripted(s) => s.apply_controls(controls).await,
        }
    }

    async fn advance(&mut self, ticks: u32) -> anyhow::Result<()> {
        match self {
            Self::Bridge(s) => s.advance(ticks).await,
            Self::Scripted(s) => s.advance(ticks).await,
        }
    }

    async fn read_sensors(&mut self) -> anyhow::Result<SensorFrame> {
        match self {
            Self::Bridge(s) => s.read_sensors().await,
            Self::Scripted(s) => s.read_sensors().await,
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self {
            Self::Bridge(s) => s.close().await,
            Self::Scripted(s) => s.close().await,
        }
    }
}
