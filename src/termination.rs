//! Crash and stall detection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TerminationConfig;
use crate::observation::Observation;

/// Why an episode ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Accumulated damage exceeded the crash threshold.
    Crash { damage: f64 },
    /// Engine speed dropped below the stall threshold.
    Stall { rpm: f64 },
}

impl TerminationReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crash { .. } => "crash",
            Self::Stall { .. } => "stall",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crash { damage } => write!(f, "crash (damage {damage})"),
            Self::Stall { rpm } => write!(f, "stall (rpm {rpm})"),
        }
    }
}

/// Crash condition alone, decided on raw damage.
///
/// Needs no other field, so it holds even for frames whose remaining
/// readings are unusable.
pub fn check_crash(config: &TerminationConfig, damage: f64) -> Option<TerminationReason> {
    (damage > config.crash_damage).then_some(TerminationReason::Crash { damage })
}

/// Terminal condition of one observation, if any.
///
/// Both thresholds are strict: damage equal to `crash_damage` or rpm equal to
/// `stall_rpm` does not end the episode. Crash is checked first.
pub fn check_termination(
    config: &TerminationConfig,
    obs: &Observation,
    damage: f64,
) -> Option<TerminationReason> {
    check_crash(config, damage).or_else(|| {
        (obs.rpm < config.stall_rpm).then_some(TerminationReason::Stall { rpm: obs.rpm })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GearshiftConfig;
    use crate::observation::DefaultedFields;

    fn obs(rpm: f64) -> Observation {
        Observation {
            speed: 40.0,
            rpm,
            gear: 2,
            clutch_input: 0.0,
            throttle_input: 0.4,
            defaulted: DefaultedFields::default(),
        }
    }

    #[test]
    fn healthy_state_continues() {
        let config = GearshiftConfig::default().termination;
        assert_eq!(check_termination(&config, &obs(3000.0), 12.0), None);
    }

    #[test]
    fn thresholds_are_strict() {
        let config = GearshiftConfig::default().termination;
        assert_eq!(check_termination(&config, &obs(100.0), 100.0), None);
        assert_eq!(
            check_termination(&config, &obs(3000.0), 100.01),
            Some(TerminationReason::Crash { damage: 100.01 })
        );
        assert_eq!(
            check_termination(&config, &obs(99.9), 0.0),
            Some(TerminationReason::Stall { rpm: 99.9 })
        );
    }

    #[test]
    fn crash_takes_precedence_over_stall() {
        let config = GearshiftConfig::default().termination;
        let reason = check_termination(&config, &obs(0.0), 500.0).unwrap();
        assert_eq!(reason.name(), "crash");
        assert_eq!(reason.to_string(), "crash (damage 500)");
    }

    #[test]
    fn crash_check_needs_only_damage() {
        let config = GearshiftConfig::default().termination;
        assert_eq!(check_crash(&config, 100.0), None);
        assert_eq!(
            check_crash(&config, 450.0),
            Some(TerminationReason::Crash { damage: 450.0 })
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(TerminationReason::Stall { rpm: 40.0 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "stall", "rpm": 40.0 }));
    }
}
