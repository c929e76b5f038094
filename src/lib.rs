pub mod config;
pub mod forces;
pub mod grid;
pub mod integrator;
pub mod output;
pub mod potential;
pub mod run;
pub mod sampling;
pub mod system;

pub use config::SimConfig;
pub use grid::CellGrid;
pub use integrator::VelocityVerlet;
pub use potential::LennardJones;
pub use run::{Phase, RunOutcome, RunReport, Runner};
pub use sampling::{SampleSet, SubsampleWindow, Thermo, ThermoSample};
pub use system::System;
