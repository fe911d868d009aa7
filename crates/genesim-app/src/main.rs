use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use genesim_app::Simulation;
use genesim_app::render::HeadlessSurface;
use genesim_core::SimConfig;

#[derive(Parser, Debug)]
#[command(
    name = "genesim",
    version,
    about = "Evolution simulation of autonomous agents on a planet with a latitude-dependent climate"
)]
struct AppCli {
    /// Task to run: 0 = run simulation, 1 = benchmark simulation,
    /// 2 = benchmark temperature computation.
    #[arg(short = 'm', long)]
    run_mode: Option<u32>,
    /// Path to a TOML config file.
    #[arg(short = 'i', long = "config", value_name = "FILE", env = "GENESIM_CONFIG")]
    config_file: Option<PathBuf>,
    /// Number of simulation worker threads (0 = hardware concurrency).
    #[arg(short = 's', long)]
    simulation_threads: Option<u32>,
    /// Number of threads precomputing temperatures (0 = hardware
    /// concurrency).
    #[arg(short = 'c', long)]
    planet_cpu_threads: Option<u32>,
    /// Number of timesteps in the simulation benchmark period.
    #[arg(short = 't', long)]
    benchmark_timesteps: Option<u32>,
    /// Number of samples when benchmarking the temperature computation.
    #[arg(short = 'p', long)]
    planet_benchmark_samples: Option<u32>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = AppCli::parse();
    let config = compose_config(&cli);
    let mut simulation = Simulation::new(config, Box::new(HeadlessSurface::unbounded()));
    simulation.run();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn compose_config(cli: &AppCli) -> SimConfig {
    let mut config = match locate_config_file(cli) {
        Some(path) => match SimConfig::load(&path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded config file");
                config
            }
            Err(err) => {
                warn!(error = %err, "reading config file failed, using internal defaults");
                SimConfig::default()
            }
        },
        None => {
            warn!("no config file specified or found, using internal defaults");
            SimConfig::default()
        }
    };

    if let Some(run_mode) = cli.run_mode {
        config.compute.run_mode = run_mode;
    }
    if let Some(threads) = cli.simulation_threads {
        config.compute.simulation_threads = threads;
    }
    if let Some(threads) = cli.planet_cpu_threads {
        config.compute.precompute_temperatures_cpu_threads = threads;
    }
    if let Some(timesteps) = cli.benchmark_timesteps {
        config.compute.simulation_benchmark_timesteps = timesteps;
    }
    if let Some(samples) = cli.planet_benchmark_samples {
        config.compute.planet_benchmark_samples = samples;
    }

    config.clamped()
}

fn locate_config_file(cli: &AppCli) -> Option<PathBuf> {
    if let Some(path) = &cli.config_file {
        return Some(path.clone());
    }
    ["./", "config/", "../config/"]
        .iter()
        .map(|dir| Path::new(dir).join("genesim.toml"))
        .find(|path| path.exists())
}
