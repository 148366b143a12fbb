//! Policy actions and their conversion into simulator controls.

use serde::{Deserialize, Serialize};

use crate::error::ContractViolation;
use crate::sim::Controls;

/// Number of fields in an action vector.
pub const ACTION_SIZE: usize = 3;

/// One action as emitted by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Throttle pedal position in `[0, 1]`.
    pub throttle: f64,
    /// Clutch pedal position in `[0, 1]`.
    pub clutch: f64,
    /// Continuous gear selector; rounded and clamped before use.
    pub gear_raw: f64,
}

impl Action {
    pub fn new(throttle: f64, clutch: f64, gear_raw: f64) -> Self {
        Self {
            throttle,
            clutch,
            gear_raw,
        }
    }

    /// Build from the fixed-order vector `[throttle, clutch, gear_raw]`.
    pub fn from_array(values: [f32; ACTION_SIZE]) -> Self {
        Self::new(
            f64::from(values[0]),
            f64::from(values[1]),
            f64::from(values[2]),
        )
    }

    /// Check the pedals and resolve the gear into a control record.
    ///
    /// Pedal positions outside `[0, 1]` and non-finite values are caller bugs.
    /// The gear is rounded to the nearest integer and clamped into
    /// `[low_gear, high_gear]`, so `7.8` becomes the top gear.
    pub fn to_controls(&self, low_gear: i32, high_gear: i32) -> Result<Controls, ContractViolation> {
        for (field, value) in [("throttle", self.throttle), ("clutch", self.clutch)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ContractViolation::ActionOutOfBounds {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if !self.gear_raw.is_finite() {
            return Err(ContractViolation::ActionOutOfBounds {
                field: "gear_raw",
                value: self.gear_raw,
                min: f64::from(low_gear),
                max: f64::from(high_gear),
            });
        }

        let gear = self
            .gear_raw
            .round()
            .clamp(f64::from(low_gear), f64::from(high_gear)) as i32;
        Ok(Controls::longitudinal(self.throttle, self.clutch, gear))
    }
}

/// Declared bounds of the action vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSpace {
    pub low_gear: i32,
    pub high_gear: i32,
}

impl ActionSpace {
    pub fn new(low_gear: i32, high_gear: i32) -> Self {
        Self {
            low_gear,
            high_gear,
        }
    }

    pub fn low(&self) -> [f32; ACTION_SIZE] {
        [0.0, 0.0, 0.0]
    }

    pub fn high(&self) -> [f32; ACTION_SIZE] {
        [1.0, 1.0, self.high_gear as f32]
    }

    pub fn to_controls(&self, action: &Action) -> Result<Controls, ContractViolation> {
        action.to_controls(self.low_gear, self.high_gear)
    }
}
