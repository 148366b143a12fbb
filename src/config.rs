use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Lowest selectable gear (neutral).
pub const LOW_GEAR: i32 = 0;
/// Highest selectable gear.
pub const HIGH_GEAR: i32 = 6;

/// Complete configuration for the gearshift environment.
///
/// Built once at startup; an [`EpisodeController`](crate::episode::EpisodeController)
/// keeps its own copy and never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearshiftConfig {
    pub simulator: SimulatorConfig,
    pub observation: ObservationConfig,
    pub reward: RewardConfig,
    pub termination: TerminationConfig,
    pub episode: EpisodeConfig,
}

/// Connection settings for the simulator bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Base URL of the simulator bridge (default: `http://127.0.0.1:25252`).
    pub bridge_url: String,
    /// Identifier of the controlled vehicle (default: `main_car`).
    pub vehicle_id: String,
    /// Simulation ticks advanced per environment step (default: 1).
    pub ticks_per_step: u32,
}

/// Unit the simulator reports vehicle speed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    MetersPerSecond,
    KilometersPerHour,
}

impl SpeedUnit {
    /// Multiplier that converts a speed in this unit to km/h.
    pub fn to_kmh_factor(self) -> f64 {
        match self {
            Self::MetersPerSecond => 3.6,
            Self::KilometersPerHour => 1.0,
        }
    }
}

/// Observation construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Unit of the raw speed reading (default: metres per second).
    pub speed_unit: SpeedUnit,
    /// Upper bound of the speed field in km/h (default: 300).
    pub max_speed_kmh: f64,
    /// Upper bound of the rpm field (default: 10000).
    pub max_rpm: f64,
    /// Lowest gear the vehicle reports (default: 0, neutral).
    pub low_gear: i32,
    /// Highest gear the vehicle reports (default: 6).
    pub high_gear: i32,
}

/// One row of the speed → gear step table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearThreshold {
    /// Speeds strictly below this value (km/h) map to `gear`.
    pub below_kmh: f64,
    pub gear: i32,
}

/// Reward shaping coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Multiplier on speed in km/h (default: 0.25).
    pub speed_weight: f64,
    /// Multiplier on positive acceleration (default: 3.0).
    pub acceleration_weight: f64,
    /// Multiplier on negative acceleration (default: 0.05).
    pub deceleration_weight: f64,
    /// Lower edge of the rpm sweet band, inclusive (default: 2000).
    pub rpm_band_low: f64,
    /// Upper edge of the rpm sweet band, inclusive (default: 7000).
    pub rpm_band_high: f64,
    /// Flat bonus while inside the sweet band (default: 1.0).
    pub rpm_band_bonus: f64,
    /// Penalty per 1000 rpm above the band (default: 1.0).
    pub overrev_penalty_per_krpm: f64,
    /// Penalty when the gear is too far from the expected gear (default: 1.0).
    pub wrong_gear_penalty: f64,
    /// Bonus when the gear is close to the expected gear (default: 0.5).
    pub right_gear_bonus: f64,
    /// Largest gear difference still counted as matching (default: 1).
    pub gear_tolerance: i32,
    /// Strictly increasing speed thresholds used to derive the expected gear.
    pub gear_table: Vec<GearThreshold>,
    /// Expected gear at or above the last threshold (default: 6).
    pub fallback_gear: i32,
    /// Reward returned on crash or stall, skipping all shaping (default: -10.0).
    pub terminal_penalty: f64,
}

/// Crash and stall thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationConfig {
    /// Damage strictly above this value is a crash (default: 100).
    pub crash_damage: f64,
    /// RPM strictly below this value is a stalled engine (default: 100).
    pub stall_rpm: f64,
}

/// Episode-level limits applied by wrappers around the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Steps after which the time-limit wrapper truncates (default: 1000).
    pub max_episode_steps: usize,
}

impl Default for GearshiftConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig {
                bridge_url: "http://127.0.0.1:25252".into(),
                vehicle_id: "main_car".into(),
                ticks_per_step: 1,
            },
            observation: ObservationConfig {
                speed_unit: SpeedUnit::MetersPerSecond,
                max_speed_kmh: 300.0,
                max_rpm: 10_000.0,
                low_gear: LOW_GEAR,
                high_gear: HIGH_GEAR,
            },
            reward: RewardConfig {
                speed_weight: 0.25,
                acceleration_weight: 3.0,
                deceleration_weight: 0.05,
                rpm_band_low: 2000.0,
                rpm_band_high: 7000.0,
                rpm_band_bonus: 1.0,
                overrev_penalty_per_krpm: 1.0,
                wrong_gear_penalty: 1.0,
                right_gear_bonus: 0.5,
                gear_tolerance: 1,
                gear_table: vec![
                    GearThreshold {
                        below_kmh: 50.0,
                        gear: 1,
                    },
                    GearThreshold {
                        below_kmh: 70.0,
                        gear: 2,
                    },
                    GearThreshold {
                        below_kmh: 100.0,
                        gear: 3,
                    },
                    GearThreshold {
                        below_kmh: 150.0,
                        gear: 4,
                    },
                    GearThreshold {
                        below_kmh: 200.0,
                        gear: 5,
                    },
                ],
                fallback_gear: HIGH_GEAR,
                terminal_penalty: -10.0,
            },
            termination: TerminationConfig {
                crash_damage: 100.0,
                stall_rpm: 100.0,
            },
            episode: EpisodeConfig {
                max_episode_steps: 1000,
            },
        }
    }
}

impl GearshiftConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let obs = &self.observation;
        ensure!(
            obs.low_gear <= obs.high_gear,
            "low_gear {} exceeds high_gear {}",
            obs.low_gear,
            obs.high_gear
        );
        ensure!(obs.max_speed_kmh > 0.0, "max_speed_kmh must be positive");
        ensure!(obs.max_rpm > 0.0, "max_rpm must be positive");
        ensure!(
            self.simulator.ticks_per_step > 0,
            "ticks_per_step must be at least 1"
        );

        let reward = &self.reward;
        for (name, value) in [
            ("speed_weight", reward.speed_weight),
            ("acceleration_weight", reward.acceleration_weight),
            ("deceleration_weight", reward.deceleration_weight),
            ("overrev_penalty_per_krpm", reward.overrev_penalty_per_krpm),
            ("wrong_gear_penalty", reward.wrong_gear_penalty),
            ("right_gear_bonus", reward.right_gear_bonus),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} must be a non-negative number, got {value}"
            );
        }
        ensure!(
            reward.rpm_band_low <= reward.rpm_band_high,
            "rpm band [{}, {}] is inverted",
            reward.rpm_band_low,
            reward.rpm_band_high
        );
        ensure!(reward.gear_tolerance >= 0, "gear_tolerance must be non-negative");

        let gear_range = obs.low_gear..=obs.high_gear;
        for pair in reward.gear_table.windows(2) {
            ensure!(
                pair[0].below_kmh < pair[1].below_kmh,
                "gear table thresholds must be strictly increasing ({} then {})",
                pair[0].below_kmh,
                pair[1].below_kmh
            );
        }
        for row in &reward.gear_table {
            ensure!(
                gear_range.contains(&row.gear),
                "gear table maps to gear {} outside [{}, {}]",
                row.gear,
                obs.low_gear,
                obs.high_gear
            );
        }
        ensure!(
            gear_range.contains(&reward.fallback_gear),
            "fallback gear {} outside [{}, {}]",
            reward.fallback_gear,
            obs.low_gear,
            obs.high_gear
        );

        ensure!(
            self.episode.max_episode_steps > 0,
            "max_episode_steps must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GearshiftConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_increasing_gear_table() {
        let mut config = GearshiftConfig::default();
        config.reward.gear_table[2].below_kmh = 60.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn rejects_gear_outside_range() {
        let mut config = GearshiftConfig::default();
        config.reward.fallback_gear = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_rpm_band() {
        let mut config = GearshiftConfig::default();
        config.reward.rpm_band_low = 8000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_ticks() {
        let mut config = GearshiftConfig::default();
        config.simulator.ticks_per_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn speed_unit_factors() {
        assert!((SpeedUnit::MetersPerSecond.to_kmh_factor() - 3.6).abs() < 1e-12);
        assert_eq!(SpeedUnit::KilometersPerHour.to_kmh_factor(), 1.0);
    }

    #[test]
    fn roundtrips_through_json_file() {
        let mut config = GearshiftConfig::default();
        config.observation.speed_unit = SpeedUnit::KilometersPerHour;
        config.reward.right_gear_bonus = 0.0;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gearshift.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = GearshiftConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_reports_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = GearshiftConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
