//! Microcanonical Lennard-Jones Argon simulation.
//!
//! Integrates the equations of motion of N Argon atoms in a periodic
//! box and measures temperature, pressure, and specific heat from
//! energy fluctuations.

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::info;

use argon_md::config::SimConfig;
use argon_md::output::{
    setup_output, write_state, write_summary, write_thermo_measurements, write_time_series,
    OutputPaths,
};
use argon_md::run::{RunOutcome, Runner};

/// Microcanonical Lennard-Jones Argon simulation with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file (defaults are used if absent)
    #[arg(short, long)]
    config_file: Option<String>,

    /// Override the number of FCC crystal cells per side
    #[arg(long)]
    cells: Option<usize>,

    /// Override the reduced density
    #[arg(short, long)]
    density: Option<f64>,

    /// Override the target reduced temperature
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Override the iteration budget
    #[arg(long)]
    iterations: Option<u64>,

    /// Override the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the output directory
    #[arg(short, long)]
    output_directory: Option<String>,

    /// Override the file prefix for this run's outputs
    #[arg(long)]
    file_prefix: Option<String>,

    /// Write the log to this file instead of stdout
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    setup_output(args.log.as_ref());

    let mut config = match &args.config_file {
        Some(path) => {
            info!("reading configuration from {path}");
            SimConfig::from_file(path)
                .map_err(|e| eyre!("{e}"))
                .wrap_err_with(|| format!("unable to load configuration {path}"))?
        }
        None => SimConfig::default(),
    };

    if let Some(cells) = args.cells {
        config.system.cells = cells;
    }
    if let Some(density) = args.density {
        config.system.density = density;
    }
    if let Some(temperature) = args.temperature {
        config.system.temperature = temperature;
    }
    if let Some(iterations) = args.iterations {
        config.run.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.system.seed = Some(seed);
    }
    if let Some(dir) = args.output_directory {
        config.output.directory = dir;
    }
    if let Some(prefix) = args.file_prefix {
        config.output.file_prefix = prefix;
    }
    config.validate().map_err(|e| eyre!(e))?;

    info!(
        cells = config.system.cells,
        density = config.system.density,
        temperature = config.system.temperature,
        iterations = config.run.iterations,
        "starting run"
    );

    let paths = OutputPaths::new(&config.output);
    paths.create_directory()?;

    let mut runner = Runner::from_config(&config).map_err(|e| eyre!(e))?;
    write_state(&paths.init_state, &runner.integrator.system)?;
    write_summary(&paths.summary, &runner.integrator.system)?;

    let report = runner.run();

    write_time_series(&paths.time_series, &report.time_series)?;
    write_state(&paths.final_state, &runner.integrator.system)?;
    write_thermo_measurements(&paths.thermo_meas, &report.samples)?;

    match report.outcome {
        RunOutcome::Complete => {
            info!(
                steps = report.steps_run,
                samples = report.samples.len(),
                "run complete"
            );
            Ok(())
        }
        RunOutcome::Diverged { step } => Err(eyre!(
            "run diverged at step {step}; adjust the time step or density and rerun"
        )),
    }
}
