//! Error taxonomy of the environment core.
//!
//! Collaborator failures and caller bugs are errors. Crash and stall are not:
//! they end the episode through `terminated` and a
//! [`TerminationReason`](crate::termination::TerminationReason).

use std::fmt;

/// Simulator collaborator operation, named in fault messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorOp {
    Restart,
    ApplyControls,
    Advance,
    ReadSensors,
    Close,
}

impl fmt::Display for SimulatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Restart => "restart_episode",
            Self::ApplyControls => "apply_controls",
            Self::Advance => "advance",
            Self::ReadSensors => "read_sensors",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Telemetry that cannot be turned into a valid observation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelemetryError {
    #[error("{field} reading is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} reading {value} outside [{min}, {max}]")]
    OutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Misuse of the controller by its caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("step() called before the first reset()")]
    StepBeforeReset,

    #[error("step() called on a terminated episode; reset() is required first")]
    StepAfterTermination,

    #[error("action {field} = {value} outside [{min}, {max}]")]
    ActionOutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Fatal error returned by the episode controller.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The simulator could not be reached or rejected a request.
    #[error("simulator fault during {op}")]
    Simulator {
        op: SimulatorOp,
        #[source]
        source: anyhow::Error,
    },

    /// The simulator answered with unusable telemetry.
    #[error("malformed telemetry from simulator: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The caller broke the reset/step protocol or sent an invalid action.
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
}

impl EnvError {
    pub(crate) fn simulator(op: SimulatorOp, source: anyhow::Error) -> Self {
        Self::Simulator { op, source }
    }

    /// Whether the simulator collaborator is to blame (unreachable or malformed data).
    pub fn is_simulator_fault(&self) -> bool {
        matches!(self, Self::Simulator { .. } | Self::Telemetry(_))
    }

    /// Whether the caller is to blame.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}
