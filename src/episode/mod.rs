//! Episode lifecycle: action handling, the reset/step controller, and
//! time-limit truncation.

pub mod action;
pub mod controller;
pub mod time_limit;

pub use action::{Action, ActionSpace, ACTION_SIZE};
pub use controller::{ControllerState, EpisodeController, EpisodeState, StepInfo, StepOutcome};
pub use time_limit::TimeLimit;
