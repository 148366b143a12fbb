//! Telemetry reader: one sensor poll per call, with fault classification.

use crate::error::{EnvError, SimulatorOp, TelemetryError};
use crate::sim::{SensorFrame, Simulator};

/// Pulls the latest sensor sample from a simulator session.
///
/// Tracks the last damage reading of the running episode so a decreasing
/// damage value (which should never happen between restarts) is surfaced.
#[derive(Debug, Clone, Default)]
pub struct TelemetryReader {
    last_damage: Option<f64>,
}

impl TelemetryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget per-episode history. Called on every episode reset.
    pub fn reset(&mut self) {
        self.last_damage = None;
    }

    /// Poll the simulator once and check the required fields.
    pub async fn read<S: Simulator>(&mut self, sim: &mut S) -> Result<SensorFrame, EnvError> {
        let frame = sim
            .read_sensors()
            .await
            .map_err(|e| EnvError::simulator(SimulatorOp::ReadSensors, e))?;
        check_required(&frame)?;

        if let Some(last) = self.last_damage {
            if frame.damage < last {
                tracing::warn!(
                    previous = last,
                    current = frame.damage,
                    "damage decreased within an episode"
                );
            }
        }
        self.last_damage = Some(frame.damage);
        Ok(frame)
    }
}

fn check_required(frame: &SensorFrame) -> Result<(), TelemetryError> {
    for (field, value) in [("speed", frame.speed), ("damage", frame.damage)] {
        if !value.is_finite() {
            return Err(TelemetryError::NonFinite { field, value });
        }
        if value < 0.0 {
            return Err(TelemetryError::OutOfBounds {
                field,
                value,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scripted::{FailingOp, ScriptedSimulator};

    fn single(frame: SensorFrame) -> ScriptedSimulator {
        ScriptedSimulator::with_episodes(vec![vec![frame]])
    }

    #[tokio::test]
    async fn reads_valid_frame() {
        let frame = SensorFrame::complete(10.0, 3000.0, 2, 0.0, 0.5, 1.0);
        let mut sim = single(frame);
        let mut reader = TelemetryReader::new();
        assert_eq!(reader.read(&mut sim).await.unwrap(), frame);
    }

    #[tokio::test]
    async fn connection_failure_is_simulator_fault() {
        let mut sim = ScriptedSimulator::new().fail_on(FailingOp::ReadSensors, 0);
        let mut reader = TelemetryReader::new();
        let err = reader.read(&mut sim).await.unwrap_err();
        assert!(matches!(
            err,
            EnvError::Simulator {
                op: SimulatorOp::ReadSensors,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn nan_speed_is_rejected() {
        let mut sim = single(SensorFrame::complete(f64::NAN, 3000.0, 2, 0.0, 0.5, 0.0));
        let mut reader = TelemetryReader::new();
        let err = reader.read(&mut sim).await.unwrap_err();
        assert!(matches!(
            err,
            EnvError::Telemetry(TelemetryError::NonFinite { field: "speed", .. })
        ));
    }

    #[tokio::test]
    async fn negative_damage_is_rejected() {
        let mut sim = single(SensorFrame::complete(1.0, 3000.0, 2, 0.0, 0.5, -3.0));
        let mut reader = TelemetryReader::new();
        let err = reader.read(&mut sim).await.unwrap_err();
        assert!(err.is_simulator_fault());
    }
}
