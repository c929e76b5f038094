use crate::forces::EnergyVirial;
use crate::system::System;

/// Instantaneous thermodynamic quantities for one step.
#[derive(Debug, Clone, Copy)]
pub struct Thermo {
    pub kinetic: f64,
    pub potential: f64,
    pub energy: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub virial: f64,
    pub msd: f64,
}

impl Thermo {
    /// Combine the particle store and the last force evaluation into
    /// the step's thermodynamic snapshot. Pressure is the ideal-gas
    /// term plus the virial correction, P = rho T + W / (3V).
    pub fn measure(system: &System, totals: &EnergyVirial) -> Thermo {
        let kinetic = system.kinetic_energy();
        let temperature = system.temperature();
        let pressure = system.density * temperature + totals.virial / (3.0 * system.volume());
        Thermo {
            kinetic,
            potential: totals.potential,
            energy: kinetic + totals.potential,
            temperature,
            pressure,
            virial: totals.virial,
            msd: system.mean_square_displacement(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.energy.is_finite() && self.pressure.is_finite()
    }
}

/// One completed top-level measurement, produced each time the
/// subsample window fills.
#[derive(Debug, Clone, Copy)]
pub struct ThermoSample {
    pub energy: f64,
    pub temperature: f64,
    pub pressure: f64,
    /// Specific heat per particle from the energy-fluctuation estimator.
    pub specific_heat: f64,
}

/// Specific heat per particle from a window of total-energy values,
/// Cv = Var(E) / (kB <T>^2 N) with kB = 1 in reduced units.
pub fn specific_heat(energies: &[f64], mean_temperature: f64, n_atoms: usize) -> f64 {
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance / (mean_temperature * mean_temperature * n_atoms as f64)
}

/// Fixed-depth window that subsamples the per-step thermodynamics and
/// reduces each filled window to one `ThermoSample`.
#[derive(Debug)]
pub struct SubsampleWindow {
    rate: u64,
    depth: usize,
    tick: u64,
    energy: Vec<f64>,
    temperature: Vec<f64>,
    virial: Vec<f64>,
    n_atoms: usize,
    density: f64,
    volume: f64,
}

impl SubsampleWindow {
    pub fn new(rate: u64, depth: usize, system: &System) -> Self {
        SubsampleWindow {
            rate: rate.max(1),
            depth,
            tick: 0,
            energy: Vec::with_capacity(depth),
            temperature: Vec::with_capacity(depth),
            virial: Vec::with_capacity(depth),
            n_atoms: system.n_atoms(),
            density: system.density,
            volume: system.volume(),
        }
    }

    /// Record one step's values. Every `rate`-th call lands in the
    /// window; a full window is drained into a sample and reset.
    pub fn push(&mut self, thermo: &Thermo) -> Option<ThermoSample> {
        self.tick += 1;
        if self.tick % self.rate != 0 {
            return None;
        }
        self.energy.push(thermo.energy);
        self.temperature.push(thermo.temperature);
        self.virial.push(thermo.virial);
        if self.energy.len() < self.depth {
            return None;
        }
        Some(self.drain())
    }

    fn drain(&mut self) -> ThermoSample {
        let n = self.energy.len() as f64;
        let mean_e = self.energy.iter().sum::<f64>() / n;
        let mean_t = self.temperature.iter().sum::<f64>() / n;
        let mean_w = self.virial.iter().sum::<f64>() / n;
        let sample = ThermoSample {
            energy: mean_e,
            temperature: mean_t,
            pressure: self.density * mean_t + mean_w / (3.0 * self.volume),
            specific_heat: specific_heat(&self.energy, mean_t, self.n_atoms),
        };
        self.energy.clear();
        self.temperature.clear();
        self.virial.clear();
        sample
    }
}

/// Top-level sample arrays; the run is complete once they fill.
#[derive(Debug)]
pub struct SampleSet {
    capacity: usize,
    samples: Vec<ThermoSample>,
}

impl SampleSet {
    pub fn new(capacity: usize) -> Self {
        SampleSet {
            capacity,
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ThermoSample) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn samples(&self) -> &[ThermoSample] {
        &self.samples
    }
}

/// One row of the per-step time series, flushed in batches.
#[derive(Debug, Clone, Copy)]
pub struct TimePoint {
    pub step: u64,
    pub temperature: f64,
    pub potential: f64,
    pub energy: f64,
    pub msd: f64,
}

/// Fixed-depth buffer for the per-step time series.
#[derive(Debug)]
pub struct BatchWindow {
    capacity: usize,
    points: Vec<TimePoint>,
}

impl BatchWindow {
    pub fn new(capacity: usize) -> Self {
        BatchWindow {
            capacity,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: TimePoint) {
        self.points.push(point);
    }

    pub fn is_full(&self) -> bool {
        self.points.len() >= self.capacity
    }

    /// Hand the buffered rows to the caller and reset the window.
    pub fn drain(&mut self) -> Vec<TimePoint> {
        std::mem::take(&mut self.points)
    }
}
