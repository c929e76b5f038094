use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::system::System;

/// Configuration for a microcanonical Lennard-Jones run.
///
/// All quantities are in reduced units. Defaults reproduce the classic
/// Argon setup: an FCC lattice of 4 atoms per crystal cell, cutoff 2.5,
/// time step 0.005.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimConfig {
    pub system: SystemConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub potential: PotentialConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Lattice and initial-condition parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Number of FCC crystal cells per side; atom count is 4 cells^3.
    pub cells: usize,
    /// Reduced number density, fixes the box edge.
    pub density: f64,
    /// Target reduced temperature for the startup rescaling.
    pub temperature: f64,
    /// Optional RNG seed for reproducible velocity initialization.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Integration and run-phase parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunConfig {
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Steps spent in the startup phase before sampling begins.
    #[serde(default = "default_startup_steps")]
    pub startup_steps: u64,
    /// Interval between temperature rescalings during startup.
    #[serde(default = "default_rescale_interval")]
    pub rescale_interval: u64,
    /// Per-atom drift of the total energy that counts as divergence.
    #[serde(default = "default_energy_tolerance")]
    pub energy_tolerance: f64,
}

/// Lennard-Jones parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PotentialConfig {
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
    /// Squared separation below which the pair interaction is clamped.
    #[serde(default = "default_r_small2")]
    pub r_small2: f64,
}

/// Nested averaging-window sizes.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingConfig {
    /// Every n-th equilibrium step enters the subsample window.
    #[serde(default = "default_subsample_rate")]
    pub subsample_rate: u64,
    /// Depth of the subsample window.
    #[serde(default = "default_subsample_depth")]
    pub subsample_depth: usize,
    /// Number of top-level samples that completes the run.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Per-step time-series rows buffered between flushes.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Output locations for the file-writing layer.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_time_step() -> f64 {
    0.005
}
fn default_iterations() -> u64 {
    100_000
}
fn default_startup_steps() -> u64 {
    5_000
}
fn default_rescale_interval() -> u64 {
    50
}
fn default_energy_tolerance() -> f64 {
    0.01
}
fn default_cutoff() -> f64 {
    2.5
}
fn default_r_small2() -> f64 {
    0.01
}
fn default_subsample_rate() -> u64 {
    1
}
fn default_subsample_depth() -> usize {
    200
}
fn default_sample_count() -> usize {
    5
}
fn default_batch_size() -> usize {
    5_000
}
fn default_directory() -> String {
    "data".to_string()
}
fn default_file_prefix() -> String {
    "run".to_string()
}

impl Default for PotentialConfig {
    fn default() -> Self {
        PotentialConfig {
            cutoff: default_cutoff(),
            r_small2: default_r_small2(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            subsample_rate: default_subsample_rate(),
            subsample_depth: default_subsample_depth(),
            sample_count: default_sample_count(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_directory(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            system: SystemConfig {
                cells: 6,
                density: 0.8,
                temperature: 0.8,
                seed: None,
            },
            run: RunConfig {
                time_step: default_time_step(),
                iterations: default_iterations(),
                startup_steps: default_startup_steps(),
                rescale_interval: default_rescale_interval(),
                energy_tolerance: default_energy_tolerance(),
            },
            potential: PotentialConfig::default(),
            sampling: SamplingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: SimConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a YAML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn n_atoms(&self) -> usize {
        4 * self.system.cells.pow(3)
    }

    /// Box edge from the density: L = (N / rho)^(1/3).
    pub fn box_len(&self) -> f64 {
        (self.n_atoms() as f64 / self.system.density).cbrt()
    }

    /// Check the configuration preconditions. The box must span at
    /// least two cutoff cells per side, and the time step must be far
    /// too small to carry an atom across a whole cell in one step.
    pub fn validate(&self) -> Result<(), String> {
        if self.system.cells == 0 {
            return Err("cell count must be positive".to_string());
        }
        if self.system.density <= 0.0 {
            return Err("density must be positive".to_string());
        }
        if self.system.temperature <= 0.0 {
            return Err("target temperature must be positive".to_string());
        }
        if self.run.time_step <= 0.0 {
            return Err("time step must be positive".to_string());
        }
        if self.run.iterations == 0 {
            return Err("iteration count must be positive".to_string());
        }
        if self.run.energy_tolerance <= 0.0 {
            return Err("energy tolerance must be positive".to_string());
        }
        if self.potential.cutoff <= 0.0 {
            return Err("cutoff radius must be positive".to_string());
        }
        if self.potential.r_small2 <= 0.0 || self.potential.r_small2 >= self.potential.cutoff.powi(2) {
            return Err("regularization threshold must lie below the squared cutoff".to_string());
        }
        if self.box_len() < 2.0 * self.potential.cutoff {
            return Err(format!(
                "box edge {:.3} spans fewer than two cells of cutoff {}; \
                 increase the cell count or the density",
                self.box_len(),
                self.potential.cutoff
            ));
        }
        if self.sampling.subsample_depth < 2 {
            return Err("subsample depth must be at least 2".to_string());
        }
        if self.sampling.sample_count == 0 || self.sampling.batch_size == 0 {
            return Err("sample count and batch size must be positive".to_string());
        }
        if self.run.rescale_interval == 0 {
            return Err("rescale interval must be positive".to_string());
        }
        Ok(())
    }

    /// Place `4 cells^3` atoms on an FCC lattice filling the box.
    pub fn generate_positions(&self) -> Vec<Vector3<f64>> {
        let cells = self.system.cells;
        let a = self.box_len() / cells as f64;
        let basis = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::new(0.5, 0.0, 0.5),
            Vector3::new(0.0, 0.5, 0.5),
        ];
        let mut positions = Vec::with_capacity(self.n_atoms());
        for i in 0..cells {
            for j in 0..cells {
                for k in 0..cells {
                    let origin = Vector3::new(i as f64, j as f64, k as f64) * a;
                    for &b in &basis {
                        positions.push(origin + b * a);
                    }
                }
            }
        }
        positions
    }

    /// Maxwell-Boltzmann velocities at the target temperature, with the
    /// center-of-mass motion removed and an exact rescale.
    pub fn generate_velocities(&self, n_atoms: usize) -> Vec<Vector3<f64>> {
        use rand::SeedableRng;
        use rand_distr::{Distribution, StandardNormal};

        let mut rng = match self.system.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };
        let normal = StandardNormal;
        let scale = self.system.temperature.sqrt();

        let mut velocities: Vec<Vector3<f64>> = (0..n_atoms)
            .map(|_| {
                Vector3::new(
                    normal.sample(&mut rng),
                    normal.sample(&mut rng),
                    normal.sample(&mut rng),
                ) * scale
            })
            .collect();

        let v_cm: Vector3<f64> = velocities.iter().sum::<Vector3<f64>>() / n_atoms as f64;
        for v in &mut velocities {
            *v -= v_cm;
        }

        // exact rescale against the momentum-constrained dof count
        if n_atoms > 1 {
            let dof = (3 * n_atoms - 3) as f64;
            let current = velocities.iter().map(|v| v.dot(v)).sum::<f64>() / dof;
            if current > 0.0 {
                let factor = (self.system.temperature / current).sqrt();
                for v in &mut velocities {
                    *v *= factor;
                }
            }
        }
        velocities
    }

    /// Build the initial `System` for this configuration.
    pub fn build_system(&self) -> Result<System, String> {
        self.validate()?;
        let positions = self.generate_positions();
        let velocities = self.generate_velocities(positions.len());
        Ok(System::new(
            positions,
            velocities,
            self.box_len(),
            self.system.density,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    fn test_config() -> SimConfig {
        SimConfig {
            system: SystemConfig {
                cells: 3,
                density: 0.8,
                temperature: 0.8,
                seed: Some(42),
            },
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_validation() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.run.time_step = -0.1;
        assert!(config.validate().is_err());
        config.run.time_step = 0.005;

        config.system.density = 0.0;
        assert!(config.validate().is_err());
        config.system.density = 0.8;

        // one crystal cell at this density gives a box of ~1.7, far
        // below two cutoff cells
        config.system.cells = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fcc_lattice() {
        let config = test_config();
        let positions = config.generate_positions();
        assert_eq!(positions.len(), 4 * 27);

        let l = config.box_len();
        assert_relative_eq!(l, (108.0 / 0.8_f64).cbrt(), epsilon = 1e-12);
        for r in &positions {
            for k in 0..3 {
                assert!(r[k] >= 0.0 && r[k] < l);
            }
        }

        // nearest-neighbor separation on an FCC lattice is a / sqrt(2)
        let a = l / 3.0;
        let d01 = (positions[0] - positions[1]).norm();
        assert_relative_eq!(d01, a / 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_generation() {
        let config = test_config();
        let velocities = config.generate_velocities(108);
        assert_eq!(velocities.len(), 108);

        let v_cm: Vector3<f64> = velocities.iter().sum::<Vector3<f64>>() / 108.0;
        assert!(v_cm.norm() < 1e-10);

        let dof = (3 * 108 - 3) as f64;
        let temperature = velocities.iter().map(|v| v.dot(v)).sum::<f64>() / dof;
        assert_relative_eq!(temperature, 0.8, epsilon = 1e-10);
    }

    #[test]
    fn test_seed_reproducibility() {
        let config = test_config();
        let a = config.generate_velocities(32);
        let b = config.generate_velocities(32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = test_config();
        let temp_file = NamedTempFile::new().unwrap();
        config.to_file(temp_file.path()).unwrap();

        let loaded = SimConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.system.cells, 3);
        assert_relative_eq!(loaded.system.density, 0.8, epsilon = 1e-15);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_build_system() {
        let config = test_config();
        let system = config.build_system().unwrap();
        assert_eq!(system.n_atoms(), 108);
        assert!(system.total_momentum().norm() < 1e-10);
        assert_relative_eq!(system.temperature(), 0.8, epsilon = 1e-10);
    }
}
