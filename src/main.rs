//! Gearshift: reinforcement-learning environment for manual-transmission driving
//!
//! Subcommands:
//!
//! - `run`     -- Drive episodes with a built-in policy and print summaries
//! - `reward`  -- Evaluate the reward function for one hand-written observation
//! - `config`  -- Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gearshift::config::GearshiftConfig;
use gearshift::episode::{Action, ActionSpace, TimeLimit};
use gearshift::observation::{DefaultedFields, Observation};
use gearshift::reward::{compute_reward, RewardState};
use gearshift::rollout::{DrivingPolicy, FixedPolicy, RandomPolicy, RolloutRunner};
use gearshift::sim::bridge::BridgeSimulator;
use gearshift::sim::scripted::ScriptedSimulator;
use gearshift::sim::AnySimulator;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Gearshift: reinforcement-learning environment for manual-transmission driving
#[derive(Parser)]
#[command(name = "gearshift", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Replay scripted telemetry instead of connecting to the simulator bridge.
    #[arg(long, global = true, default_value_t = true, action = clap::ArgAction::Set)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum PolicyChoice {
    Random,
    Fixed,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive episodes and print one summary per episode.
    Run {
        /// Number of episodes to run.
        #[arg(long, default_value_t = 3)]
        episodes: usize,

        /// Which built-in policy drives the car.
        #[arg(long, default_value = "random")]
        policy: PolicyChoice,

        /// Seed for the random policy.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Override the time limit from the configuration.
        #[arg(long)]
        max_steps: Option<usize>,

        /// Print episode records as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the reward function once and print the breakdown.
    Reward {
        /// Speed in km/h.
        #[arg(long)]
        speed: f64,

        #[arg(long)]
        rpm: f64,

        #[arg(long)]
        gear: i32,

        #[arg(long, default_value_t = 0.0)]
        damage: f64,

        /// Speed at the previous step in km/h.
        #[arg(long, default_value_t = 0.0)]
        previous_speed: f64,

        #[arg(long, default_value_t = 0.0)]
        clutch: f64,

        #[arg(long, default_value_t = 0.0)]
        throttle: f64,
    },

    /// Print the effective configuration as JSON.
    Config,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GearshiftConfig::load_from_file(path)?,
        None => GearshiftConfig::default(),
    };

    match cli.command {
        Commands::Run {
            episodes,
            policy,
            seed,
            max_steps,
            json,
        } => cmd_run(config, cli.mock, episodes, &policy, seed, max_steps, json).await,
        Commands::Reward {
            speed,
            rpm,
            gear,
            damage,
            previous_speed,
            clutch,
            throttle,
        } => {
            let obs = Observation {
                speed,
                rpm,
                gear,
                clutch_input: clutch,
                throttle_input: throttle,
                defaulted: DefaultedFields::default(),
            };
            cmd_reward(&config, &obs, damage, previous_speed)
        }
        Commands::Config => cmd_config(&config),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    mut config: GearshiftConfig,
    mock: bool,
    episodes: usize,
    policy: &PolicyChoice,
    seed: u64,
    max_steps: Option<usize>,
    json: bool,
) -> Result<()> {
    if let Some(limit) = max_steps {
        config.episode.max_episode_steps = limit;
        config.validate().context("Invalid --max-steps")?;
    }

    let space = ActionSpace::new(config.observation.low_gear, config.observation.high_gear);
    let mut policy: Box<dyn DrivingPolicy> = match policy {
        PolicyChoice::Random => Box::new(RandomPolicy::new(seed, &space)),
        PolicyChoice::Fixed => Box::new(FixedPolicy::new(Action::new(0.6, 0.0, 2.0))),
    };

    let mut env = TimeLimit::from_config(create_simulator(&config, mock), &config);
    tracing::info!(episodes, max_steps = env.max_episode_steps(), "Running episodes");

    let runner = RolloutRunner::new();
    let mut total = 0.0;
    for _ in 0..episodes {
        let record = runner
            .run_episode(&mut env, &mut policy)
            .await
            .context("Episode aborted")?;
        total += record.total_reward;

        if json {
            println!("{}", serde_json::to_string(&record)?);
        } else {
            println!(
                "episode {:>3}  steps {:>4}  reward {:>10.2}  outcome {:<9}  mean rpm {:>7.0}  mean gear {:.2}",
                record.episode,
                record.steps,
                record.total_reward,
                record.outcome(),
                record.stats.mean_rpm,
                record.stats.mean_gear,
            );
        }
    }

    env.close().await.context("Failed to close simulator session")?;

    if episodes > 0 {
        tracing::info!(
            episodes,
            mean_reward = total / episodes as f64,
            "Run finished"
        );
    }
    Ok(())
}

fn cmd_reward(
    config: &GearshiftConfig,
    obs: &Observation,
    damage: f64,
    previous_speed: f64,
) -> Result<()> {
    let state = RewardState {
        previous_speed,
        previous_acceleration: 0.0,
    };
    let outcome = compute_reward(&config.reward, &config.termination, obs, damage, state);
    let b = &outcome.breakdown;

    println!("Reward: {:.4}", outcome.reward);
    match &b.terminal {
        Some(reason) => println!("  Terminal: {reason}"),
        None => {
            println!("  Speed:        {:>9.4}", b.speed);
            println!("  Acceleration: {:>9.4}", b.acceleration);
            println!("  RPM band:     {:>9.4}", b.rpm_band);
            println!(
                "  Gear:         {:>9.4}  (expected {}, got {})",
                b.gear, b.expected_gear, obs.gear
            );
        }
    }
    println!("  Acceleration this step: {:.4}", outcome.acceleration());
    Ok(())
}

fn cmd_config(config: &GearshiftConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Simulator construction
// ---------------------------------------------------------------------------

fn create_simulator(config: &GearshiftConfig, mock: bool) -> AnySimulator {
    if mock {
        tracing::info!("Using scripted simulator");
        AnySimulator::Scripted(ScriptedSimulator::new())
    } else {
        tracing::info!(url = %config.simulator.bridge_url, "Using simulator bridge");
        AnySimulator::Bridge(BridgeSimulator::new(&config.simulator))
    }
}
