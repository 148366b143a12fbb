//! Gearshift: a reinforcement-learning environment for manual-transmission
//! driving in an external vehicle simulator.
//!
//! The policy controls throttle, clutch and gear. Each step the
//! [`EpisodeController`](episode::EpisodeController) forwards the controls to
//! the simulator, advances time, reads telemetry, and scores the result with
//! a speed, acceleration, rpm-band and gear-matching reward. Crashes and
//! stalls end the episode.

pub mod config;
pub mod episode;
pub mod error;
pub mod observation;
pub mod reward;
pub mod rollout;
pub mod sim;
pub mod telemetry;
pub mod termination;
