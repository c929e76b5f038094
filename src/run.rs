use tracing::{info, warn};

use crate::config::SimConfig;
use crate::integrator::VelocityVerlet;
use crate::potential::LennardJones;
use crate::sampling::{BatchWindow, SampleSet, SubsampleWindow, Thermo, ThermoSample, TimePoint};

/// Run phase. Startup relaxes the lattice under periodic temperature
/// rescaling; Equilibrium feeds the sampling pipeline; Diverge is
/// terminal and reached only from a failed stability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    Equilibrium,
    Diverge,
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The sample arrays filled or the iteration budget ran out.
    Complete,
    /// Energy conservation or finiteness failed at the given step.
    Diverged { step: u64 },
}

/// Everything the I/O layer needs after a run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub samples: Vec<ThermoSample>,
    pub time_series: Vec<TimePoint>,
    pub steps_run: u64,
}

/// Drives the integrator through the run phases and the sampling
/// pipeline.
pub struct Runner {
    pub integrator: VelocityVerlet,
    phase: Phase,
    target_temperature: f64,
    iterations: u64,
    startup_steps: u64,
    rescale_interval: u64,
    /// Allowed per-atom drift of the total energy in Equilibrium.
    energy_tolerance: f64,
    /// Total energy at the first Equilibrium step.
    e_ref: Option<f64>,
    subsample: SubsampleWindow,
    samples: SampleSet,
    batch: BatchWindow,
}

impl Runner {
    /// Set up the initial state: lattice positions, Maxwell-Boltzmann
    /// velocities with zeroed momentum, cell lists, and initial forces.
    pub fn from_config(config: &SimConfig) -> Result<Self, String> {
        let mut system = config.build_system()?;
        system.recenter();
        system.zero_momentum();
        system.scale_temperature(config.system.temperature);

        let lj = LennardJones::new(
            config.potential.cutoff,
            config.potential.r_small2,
            system.box_len,
        );
        let subsample = SubsampleWindow::new(
            config.sampling.subsample_rate,
            config.sampling.subsample_depth,
            &system,
        );
        let integrator = VelocityVerlet::new(system, lj, config.run.time_step)?;

        info!(
            atoms = integrator.system.n_atoms(),
            box_len = integrator.system.box_len,
            blocks_per_side = integrator.grid.blocks_per_side,
            "system initialized"
        );

        Ok(Runner {
            integrator,
            phase: Phase::Startup,
            target_temperature: config.system.temperature,
            iterations: config.run.iterations,
            startup_steps: config.run.startup_steps,
            rescale_interval: config.run.rescale_interval,
            energy_tolerance: config.run.energy_tolerance,
            e_ref: None,
            subsample,
            samples: SampleSet::new(config.sampling.sample_count),
            batch: BatchWindow::new(config.sampling.batch_size),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Integrate until the sample arrays fill, the iteration budget is
    /// spent, or the run diverges.
    pub fn run(&mut self) -> RunReport {
        let mut time_series = Vec::new();
        let mut outcome = RunOutcome::Complete;
        let mut steps_run = 0;

        for step in 1..=self.iterations {
            self.integrator.full_step();
            steps_run = step;

            let thermo = Thermo::measure(&self.integrator.system, &self.integrator.last_totals());
            self.batch.push(TimePoint {
                step,
                temperature: thermo.temperature,
                potential: thermo.potential,
                energy: thermo.energy,
                msd: thermo.msd,
            });
            if self.batch.is_full() {
                info!(
                    step,
                    temperature = thermo.temperature,
                    energy = thermo.energy,
                    pressure = thermo.pressure,
                    max_speed = self.integrator.system.max_speed(),
                    transfers = self.integrator.grid.transfers(),
                    "batch complete"
                );
                time_series.extend(self.batch.drain());
            }

            match self.phase {
                Phase::Startup => {
                    if step % self.rescale_interval == 0 || step == self.startup_steps {
                        self.integrator.system.zero_momentum();
                        self.integrator.system.scale_temperature(self.target_temperature);
                    }
                    if step >= self.startup_steps {
                        info!(step, "startup complete, entering equilibrium");
                        self.phase = Phase::Equilibrium;
                    }
                }
                Phase::Equilibrium => {
                    if !self.stable(&thermo) {
                        warn!(
                            step,
                            energy = thermo.energy,
                            "energy conservation check failed, halting"
                        );
                        self.phase = Phase::Diverge;
                        outcome = RunOutcome::Diverged { step };
                        break;
                    }
                    if self.e_ref.is_none() {
                        self.e_ref = Some(thermo.energy);
                    }
                    if let Some(sample) = self.subsample.push(&thermo) {
                        info!(
                            step,
                            temperature = sample.temperature,
                            pressure = sample.pressure,
                            specific_heat = sample.specific_heat,
                            "thermo sample recorded"
                        );
                        self.samples.push(sample);
                        if self.samples.is_full() {
                            info!(step, "sample arrays full, run complete");
                            break;
                        }
                    }
                }
                Phase::Diverge => break,
            }
        }

        time_series.extend(self.batch.drain());
        RunReport {
            outcome,
            samples: self.samples.samples().to_vec(),
            time_series,
            steps_run,
        }
    }

    /// Equilibrium stability check: finite quantities, and a total
    /// energy within the configured per-atom tolerance of its value at
    /// the start of Equilibrium.
    fn stable(&self, thermo: &Thermo) -> bool {
        if !thermo.is_finite() {
            return false;
        }
        match self.e_ref {
            Some(e_ref) => {
                let drift = (thermo.energy - e_ref).abs() / self.integrator.system.n_atoms() as f64;
                drift <= self.energy_tolerance
            }
            None => true,
        }
    }
}
