//! Scripted simulator session that replays canned telemetry.
//!
//! Each restart moves to the next canned episode (cycling). Within an
//! episode, every `advance` moves one frame forward; once the frames run out
//! the last one repeats. Forwarded controls and tick counts are recorded so
//! tests can check exactly what the controller sent.

use anyhow::{bail, Result};

use super::traits::{Controls, SensorFrame, Simulator};

/// Collaborator operation that a [`ScriptedSimulator`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingOp {
    Restart,
    ApplyControls,
    Advance,
    ReadSensors,
}

/// A scripted simulator replaying canned episodes.
#[derive(Debug, Clone)]
pub struct ScriptedSimulator {
    episodes: Vec<Vec<SensorFrame>>,
    episode_index: Option<usize>,
    frame_index: usize,
    restarts: usize,
    ticks: u64,
    controls: Vec<Controls>,
    failing: Option<(FailingOp, usize)>,
    closed: bool,
}

impl ScriptedSimulator {
    /// Create a simulator replaying the built-in driving episodes.
    pub fn new() -> Self {
        Self::with_episodes(Self::default_episodes())
    }

    /// Create a simulator replaying the given episodes.
    ///
    /// Empty episodes are replaced by a single idle frame.
    pub fn with_episodes(episodes: Vec<Vec<SensorFrame>>) -> Self {
        let mut episodes: Vec<Vec<SensorFrame>> = episodes
            .into_iter()
            .map(|frames| {
                if frames.is_empty() {
                    vec![idle_frame()]
                } else {
                    frames
                }
            })
            .collect();
        if episodes.is_empty() {
            episodes.push(vec![idle_frame()]);
        }
        Self {
            episodes,
            episode_index: None,
            frame_index: 0,
            restarts: 0,
            ticks: 0,
            controls: Vec::new(),
            failing: None,
            closed: false,
        }
    }

    /// Make `op` fail once it has succeeded `after` times.
    pub fn fail_on(mut self, op: FailingOp, after: usize) -> Self {
        self.failing = Some((op, after));
        self
    }

    /// Every control record forwarded so far.
    pub fn applied_controls(&self) -> &[Controls] {
        &self.controls
    }

    /// Total simulated ticks advanced across all episodes.
    pub fn ticks_advanced(&self) -> u64 {
        self.ticks
    }

    /// Number of scenario restarts requested.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check(&mut self, op: FailingOp) -> Result<()> {
        if let Some((failing, remaining)) = self.failing.as_mut() {
            if *failing == op {
                if *remaining == 0 {
                    bail!("scripted {op:?} failure: simulator connection lost");
                }
                *remaining -= 1;
            }
        }
        Ok(())
    }

    fn current_frame(&self) -> SensorFrame {
        let episode = match self.episode_index {
            Some(idx) => &self.episodes[idx % self.episodes.len()],
            None => &self.episodes[0],
        };
        let last = episode.len() - 1;
        episode[self.frame_index.min(last)]
    }

    /// Built-in episodes, speed in m/s:
    /// 1. pulling away in first and shifting up until the engine bogs and stalls,
    /// 2. cruising fast and hitting an obstacle,
    /// 3. a steady cruise in third that never terminates on its own.
    fn default_episodes() -> Vec<Vec<SensorFrame>> {
        vec![
            vec![
                SensorFrame::complete(0.0, 900.0, 1, 1.0, 0.0, 0.0),
                SensorFrame::complete(2.5, 2400.0, 1, 0.2, 0.8, 0.0),
                SensorFrame::complete(6.0, 4100.0, 1, 0.0, 1.0, 0.0),
                SensorFrame::complete(10.0, 5600.0, 1, 0.0, 1.0, 0.0),
                SensorFrame::complete(13.5, 3900.0, 2, 0.0, 1.0, 0.0),
                SensorFrame::complete(16.0, 4700.0, 2, 0.0, 0.9, 0.0),
                SensorFrame::complete(15.0, 1200.0, 5, 0.0, 0.3, 0.0),
                SensorFrame::complete(12.0, 40.0, 5, 0.0, 0.0, 0.0),
            ],
            vec![
                SensorFrame::complete(20.0, 4500.0, 3, 0.0, 1.0, 0.0),
                SensorFrame::complete(24.0, 5200.0, 3, 0.0, 1.0, 0.0),
                SensorFrame::complete(28.0, 5900.0, 4, 0.0, 1.0, 0.0),
                SensorFrame::complete(31.0, 6400.0, 4, 0.0, 1.0, 35.0),
                SensorFrame::complete(2.0, 1800.0, 4, 0.0, 0.0, 450.0),
            ],
            vec![
                SensorFrame::complete(22.0, 3000.0, 3, 0.0, 0.5, 0.0),
                SensorFrame::complete(22.2, 3020.0, 3, 0.0, 0.5, 0.0),
                SensorFrame::complete(22.4, 3040.0, 3, 0.0, 0.5, 0.0),
            ],
        ]
    }
}

fn idle_frame() -> SensorFrame {
    SensorFrame::complete(0.0, 900.0, 0, 0.0, 0.0, 0.0)
}

impl Default for ScriptedSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator for ScriptedSimulator {
    async fn restart_episode(&mut self) -> Result<()> {
        self.check(FailingOp::Restart)?;
        self.restarts += 1;
        self.episode_index = Some(self.episode_index.map_or(0, |idx| idx + 1));
        self.frame_index = 0;
        Ok(())
    }

    async fn apply_controls(&mut self, controls: Controls) -> Result<()> {
        self.check(FailingOp::ApplyControls)?;
        self.controls.push(controls);
        Ok(())
    }

    async fn advance(&mut self, ticks: u32) -> Result<()> {
        self.check(FailingOp::Advance)?;
        self.ticks += u64::from(ticks);
        self.frame_index += ticks as usize;
        Ok(())
    }

    async fn read_sensors(&mut self) -> Result<SensorFrame> {
        self.check(FailingOp::ReadSensors)?;
        Ok(self.current_frame())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
