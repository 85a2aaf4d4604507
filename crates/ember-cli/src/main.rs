//! Ember CLI - run and check particle lifecycle configurations

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, init, run};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Device-resident particle lifecycle engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Output path
        #[arg(default_value = "ember.toml")]
        path: String,

        /// Motion policy preset (none, spiral, curl_noise, spherical_shell, galactic_disk, ring_orbit)
        #[arg(long, default_value = "none", value_parser = parse_policy)]
        policy: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Check {
        /// Path to configuration file
        config: String,
    },

    /// Run the simulation headless and report pool counters
    Run {
        /// Path to configuration file (defaults when omitted)
        #[arg(long)]
        config: Option<String>,

        /// Compute backend (cpu or gpu)
        #[arg(long, default_value = "cpu", value_parser = parse_backend)]
        backend: String,

        /// Number of steps
        #[arg(long, default_value = "600")]
        steps: u32,

        /// Timestep in seconds
        #[arg(long, default_value = "0.016666668", value_parser = parse_dt)]
        dt: f32,

        /// Override the particle pool capacity
        #[arg(long)]
        capacity: Option<u32>,

        /// Prewarm before the first step
        #[arg(long)]
        prewarm: bool,

        /// Hold the pointer at this point (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3)]
        pointer: Option<[f32; 3]>,

        /// Print a summary line every N steps (0 = only at the end)
        #[arg(long, default_value = "60")]
        report_every: u32,

        /// Read back the whole pool at the end and check the slot partition
        #[arg(long)]
        verify: bool,
    },
}

fn parse_backend(s: &str) -> Result<String, String> {
    match s {
        "cpu" | "gpu" => Ok(s.to_string()),
        _ => Err(format!("unknown backend '{}'; valid values: cpu, gpu", s)),
    }
}

fn parse_dt(s: &str) -> Result<f32, String> {
    let dt: f32 = s.parse().map_err(|e| format!("invalid timestep: {}", e))?;
    if dt.is_finite() && dt >= 0.0 {
        Ok(dt)
    } else {
        Err(format!("timestep must be finite and non-negative, got {}", s))
    }
}

fn parse_policy(s: &str) -> Result<String, String> {
    if init::POLICY_PRESETS.contains(&s) {
        Ok(s.to_string())
    } else {
        Err(format!(
            "unknown policy '{}'; valid values: {}",
            s,
            init::POLICY_PRESETS.join(", ")
        ))
    }
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            path,
            policy,
            force,
        } => init::run(&path, &policy, force),
        Commands::Check { config } => check::run(&config),
        Commands::Run {
            config,
            backend,
            steps,
            dt,
            capacity,
            prewarm,
            pointer,
            report_every,
            verify,
        } => run::run(run::RunArgs {
            config,
            backend,
            steps,
            dt,
            capacity,
            prewarm,
            pointer,
            report_every,
            verify,
        }),
    }
}
