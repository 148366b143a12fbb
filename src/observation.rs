//! Observation builder: raw sensor frame → fixed 5-field observation.
//!
//! Field order is fixed for the lifetime of the environment:
//! `[speed (km/h), rpm, gear, clutch_input, throttle_input]`.
//!
//! Values outside the declared bound table are reported as telemetry faults,
//! never clipped.

use serde::{Deserialize, Serialize};

use crate::config::{ObservationConfig, SpeedUnit};
use crate::error::TelemetryError;
use crate::sim::SensorFrame;

/// Number of fields in an observation vector.
pub const OBS_SIZE: usize = 5;

/// Which optional sensor fields were absent and replaced by zero.
///
/// A defaulted zero is indistinguishable from a real zero in the observation
/// vector itself; these flags keep the difference visible in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultedFields {
    pub rpm: bool,
    pub gear: bool,
    pub clutch_input: bool,
    pub throttle_input: bool,
}

impl DefaultedFields {
    pub fn any(&self) -> bool {
        self.rpm || self.gear || self.clutch_input || self.throttle_input
    }

    /// Names of the defaulted fields, in observation order.
    pub fn names(&self) -> Vec<&'static str> {
        [
            ("rpm", self.rpm),
            ("gear", self.gear),
            ("clutch_input", self.clutch_input),
            ("throttle_input", self.throttle_input),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// One observation of the vehicle state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Speed in km/h.
    pub speed: f64,
    pub rpm: f64,
    pub gear: i32,
    pub clutch_input: f64,
    pub throttle_input: f64,
    #[serde(default)]
    pub defaulted: DefaultedFields,
}

impl Observation {
    /// The observation as the fixed-order vector handed to the policy.
    pub fn to_array(&self) -> [f32; OBS_SIZE] {
        [
            self.speed as f32,
            self.rpm as f32,
            self.gear as f32,
            self.clutch_input as f32,
            self.throttle_input as f32,
        ]
    }
}

/// Declared bounds of every observation field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationSpace {
    pub max_speed_kmh: f64,
    pub max_rpm: f64,
    pub low_gear: i32,
    pub high_gear: i32,
}

impl ObservationSpace {
    pub fn from_config(config: &ObservationConfig) -> Self {
        Self {
            max_speed_kmh: config.max_speed_kmh,
            max_rpm: config.max_rpm,
            low_gear: config.low_gear,
            high_gear: config.high_gear,
        }
    }

    pub fn low(&self) -> [f32; OBS_SIZE] {
        [0.0, 0.0, self.low_gear as f32, 0.0, 0.0]
    }

    pub fn high(&self) -> [f32; OBS_SIZE] {
        [
            self.max_speed_kmh as f32,
            self.max_rpm as f32,
            self.high_gear as f32,
            1.0,
            1.0,
        ]
    }

    /// Check every field against the bound table.
    pub fn check(&self, obs: &Observation) -> Result<(), TelemetryError> {
        let fields = [
            ("speed", obs.speed, 0.0, self.max_speed_kmh),
            ("rpm", obs.rpm, 0.0, self.max_rpm),
            (
                "gear",
                f64::from(obs.gear),
                f64::from(self.low_gear),
                f64::from(self.high_gear),
            ),
            ("clutch_input", obs.clutch_input, 0.0, 1.0),
            ("throttle_input", obs.throttle_input, 0.0, 1.0),
        ];
        for (field, value, min, max) in fields {
            if !value.is_finite() {
                return Err(TelemetryError::NonFinite { field, value });
            }
            if value < min || value > max {
                return Err(TelemetryError::OutOfBounds {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, obs: &Observation) -> bool {
        self.check(obs).is_ok()
    }
}

/// Converts raw sensor frames into bounded observations.
#[derive(Debug, Clone, Copy)]
pub struct ObservationBuilder {
    speed_unit: SpeedUnit,
    space: ObservationSpace,
}

impl ObservationBuilder {
    pub fn new(speed_unit: SpeedUnit, space: ObservationSpace) -> Self {
        Self { speed_unit, space }
    }

    pub fn from_config(config: &ObservationConfig) -> Self {
        Self::new(config.speed_unit, ObservationSpace::from_config(config))
    }

    pub fn space(&self) -> &ObservationSpace {
        &self.space
    }

    /// Build the observation for one frame.
    ///
    /// Speed is converted to km/h; absent optional fields become zero and are
    /// flagged in [`Observation::defaulted`].
    pub fn build(&self, frame: &SensorFrame) -> Result<Observation, TelemetryError> {
        let obs = self.convert(frame);
        self.space.check(&obs)?;
        Ok(obs)
    }

    /// Like [`build`](Self::build) but without the bounds check.
    pub fn convert(&self, frame: &SensorFrame) -> Observation {
        let defaulted = DefaultedFields {
            rpm: frame.rpm.is_none(),
            gear: frame.gear.is_none(),
            clutch_input: frame.clutch_input.is_none(),
            throttle_input: frame.throttle_input.is_none(),
        };

        Observation {
            speed: frame.speed * self.speed_unit.to_kmh_factor(),
            rpm: frame.rpm.unwrap_or(0.0),
            gear: frame.gear.unwrap_or(0),
            clutch_input: frame.clutch_input.unwrap_or(0.0),
            throttle_input: frame.throttle_input.unwrap_or(0.0),
            defaulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GearshiftConfig;

    fn builder(unit: SpeedUnit) -> ObservationBuilder {
        let mut config = GearshiftConfig::default().observation;
        config.speed_unit = unit;
        ObservationBuilder::from_config(&config)
    }

    #[test]
    fn converts_meters_per_second_to_kmh() {
        let frame = SensorFrame::complete(10.0, 3000.0, 2, 0.0, 0.5, 0.0);
        let obs = builder(SpeedUnit::MetersPerSecond).build(&frame).unwrap();
        assert!((obs.speed - 36.0).abs() < 1e-9);
    }

    #[test]
    fn kmh_source_passes_through() {
        let frame = SensorFrame::complete(45.0, 3000.0, 1, 0.0, 0.5, 0.0);
        let obs = builder(SpeedUnit::KilometersPerHour).build(&frame).unwrap();
        assert_eq!(obs.speed, 45.0);
    }

    #[test]
    fn fixed_field_order() {
        let frame = SensorFrame::complete(100.0, 4000.0, 3, 0.25, 0.75, 0.0);
        let obs = builder(SpeedUnit::KilometersPerHour).build(&frame).unwrap();
        assert_eq!(obs.to_array(), [100.0, 4000.0, 3.0, 0.25, 0.75]);
    }

    #[test]
    fn missing_optionals_default_to_zero_and_are_flagged() {
        let frame = SensorFrame {
            speed: 5.0,
            rpm: None,
            gear: None,
            clutch_input: None,
            throttle_input: Some(0.3),
            damage: 0.0,
        };
        let obs = builder(SpeedUnit::KilometersPerHour).build(&frame).unwrap();
        assert_eq!(obs.rpm, 0.0);
        assert_eq!(obs.gear, 0);
        assert_eq!(obs.clutch_input, 0.0);
        assert_eq!(obs.throttle_input, 0.3);
        assert!(obs.defaulted.any());
        assert_eq!(obs.defaulted.names(), vec!["rpm", "gear", "clutch_input"]);
    }

    #[test]
    fn complete_frame_has_no_defaulted_fields() {
        let frame = SensorFrame::complete(5.0, 1000.0, 1, 0.0, 0.0, 0.0);
        let obs = builder(SpeedUnit::KilometersPerHour).build(&frame).unwrap();
        assert!(!obs.defaulted.any());
        assert!(obs.defaulted.names().is_empty());
    }

    #[test]
    fn out_of_range_rpm_is_a_fault_not_clipped() {
        let frame = SensorFrame::complete(5.0, 12_000.0, 1, 0.0, 0.0, 0.0);
        let err = builder(SpeedUnit::KilometersPerHour)
            .build(&frame)
            .unwrap_err();
        assert_eq!(
            err,
            TelemetryError::OutOfBounds {
                field: "rpm",
                value: 12_000.0,
                min: 0.0,
                max: 10_000.0,
            }
        );
    }

    #[test]
    fn convert_keeps_out_of_range_values() {
        let frame = SensorFrame::complete(5.0, 12_000.0, 1, 0.0, 0.0, 0.0);
        let b = builder(SpeedUnit::KilometersPerHour);
        let obs = b.convert(&frame);
        assert_eq!(obs.rpm, 12_000.0);
        assert!(!b.space().contains(&obs));
    }

    #[test]
    fn reverse_gear_is_outside_declared_range() {
        let frame = SensorFrame::complete(5.0, 1000.0, -1, 0.0, 0.0, 0.0);
        let err = builder(SpeedUnit::KilometersPerHour)
            .build(&frame)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::OutOfBounds { field: "gear", .. }));
    }

    #[test]
    fn converted_speed_is_bounds_checked() {
        // 90 m/s is 324 km/h, above the 300 km/h bound.
        let frame = SensorFrame::complete(90.0, 5000.0, 6, 0.0, 1.0, 0.0);
        let err = builder(SpeedUnit::MetersPerSecond).build(&frame).unwrap_err();
        assert!(matches!(err, TelemetryError::OutOfBounds { field: "speed", .. }));
    }

    #[test]
    fn observations_within_sensor_ranges_stay_in_bounds() {
        let b = builder(SpeedUnit::MetersPerSecond);
        let space = *b.space();
        let (low, high) = (space.low(), space.high());
        for speed in [0.0, 13.9, 41.6, 83.3] {
            for rpm in [0.0, 850.0, 6500.0, 10_000.0] {
                for gear in 0..=6 {
                    let frame = SensorFrame::complete(speed, rpm, gear, 1.0, 0.0, 0.0);
                    let obs = b.build(&frame).unwrap();
                    for (i, v) in obs.to_array().iter().enumerate() {
                        assert!(*v >= low[i] && *v <= high[i], "field {i} = {v}");
                    }
                }
            }
        }
    }
}
