//! File output and logging setup.
//!
//! The core exposes plain snapshots and sample arrays; everything here
//! just serializes them as whitespace-separated text, one record per
//! line, in a stable column order.

use color_eyre::eyre::{Result, WrapErr};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt::layer, layer::SubscriberExt, util::SubscriberInitExt, Registry};

use crate::config::OutputConfig;
use crate::sampling::{ThermoSample, TimePoint};
use crate::system::System;

/// Install the tracing subscriber, logging to a file if a path is
/// given, otherwise to stdout.
pub fn setup_output(log_path: Option<&String>) {
    match log_path {
        Some(path) => {
            if let Ok(log) = File::create(path) {
                let file_layer = layer().with_writer(log).with_ansi(false);
                Registry::default().with(file_layer).init();
            } else {
                eprintln!("could not create log file: {path}");
            }
        }
        None => {
            let stdout_layer = layer().with_writer(std::io::stdout);
            Registry::default().with(stdout_layer).init();
        }
    }
}

/// Paths of the per-run output files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub time_series: PathBuf,
    pub init_state: PathBuf,
    pub final_state: PathBuf,
    pub summary: PathBuf,
    pub thermo_meas: PathBuf,
}

impl OutputPaths {
    pub fn new(output: &OutputConfig) -> Self {
        let dir = Path::new(&output.directory);
        let prefix = &output.file_prefix;
        OutputPaths {
            time_series: dir.join(format!("{prefix}-time-series.dat")),
            init_state: dir.join(format!("{prefix}-init-state.dat")),
            final_state: dir.join(format!("{prefix}-final-state.dat")),
            summary: dir.join(format!("{prefix}-summary.dat")),
            thermo_meas: dir.join(format!("{prefix}-thermo-meas.dat")),
        }
    }

    pub fn create_directory(&self) -> Result<()> {
        if let Some(dir) = self.time_series.parent() {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("unable to create output directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Step, temperature, potential, total energy, and mean square
/// displacement per line.
pub fn write_time_series(path: &Path, rows: &[TimePoint]) -> Result<()> {
    let mut w = writer(path)?;
    for row in rows {
        writeln!(
            w,
            "{} {:.8} {:.8} {:.8} {:.8}",
            row.step, row.temperature, row.potential, row.energy, row.msd
        )?;
    }
    w.flush()?;
    info!(path = %path.display(), rows = rows.len(), "time series written");
    Ok(())
}

/// Positions then velocities, one atom per line, enough to resume or
/// analyze a run.
pub fn write_state(path: &Path, system: &System) -> Result<()> {
    let mut w = writer(path)?;
    for (r, v) in system.positions.iter().zip(&system.velocities) {
        writeln!(
            w,
            "{:.12} {:.12} {:.12} {:.12} {:.12} {:.12}",
            r.x, r.y, r.z, v.x, v.y, v.z
        )?;
    }
    w.flush()?;
    info!(path = %path.display(), "state written");
    Ok(())
}

/// Box edge, atom count, and density.
pub fn write_summary(path: &Path, system: &System) -> Result<()> {
    let mut w = writer(path)?;
    writeln!(
        w,
        "{:.12} {} {:.12}",
        system.box_len,
        system.n_atoms(),
        system.density
    )?;
    w.flush()?;
    Ok(())
}

/// Temperature, pressure, specific heat, and energy per completed
/// top-level sample.
pub fn write_thermo_measurements(path: &Path, samples: &[ThermoSample]) -> Result<()> {
    let mut w = writer(path)?;
    for s in samples {
        writeln!(
            w,
            "{:.8} {:.8} {:.8} {:.8}",
            s.temperature, s.pressure, s.specific_heat, s.energy
        )?;
    }
    w.flush()?;
    info!(path = %path.display(), samples = samples.len(), "thermo measurements written");
    Ok(())
}

fn writer(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).wrap_err_with(|| format!("unable to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use tempfile::tempdir;

    #[test]
    fn test_paths_use_prefix() {
        let output = OutputConfig {
            directory: "out".to_string(),
            file_prefix: "t0.8-d0.8".to_string(),
        };
        let paths = OutputPaths::new(&output);
        assert_eq!(
            paths.time_series,
            Path::new("out").join("t0.8-d0.8-time-series.dat")
        );
    }

    #[test]
    fn test_state_round_trip_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.dat");
        let system = System::new(
            vec![Vector3::new(1.0, 2.0, 3.0)],
            vec![Vector3::new(-0.5, 0.0, 0.5)],
            5.0,
            1.0 / 125.0,
        );
        write_state(&path, &system).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = content.split_whitespace().collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0].parse::<f64>().unwrap(), 1.0);
        assert_eq!(fields[5].parse::<f64>().unwrap(), 0.5);
    }

    #[test]
    fn test_thermo_measurements_one_line_per_sample() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thermo.dat");
        let samples = vec![
            ThermoSample {
                energy: -5.0,
                temperature: 0.8,
                pressure: 1.2,
                specific_heat: 2.5,
            };
            3
        ];
        write_thermo_measurements(&path, &samples).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
