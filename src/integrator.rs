use itertools::izip;

use crate::forces::{evaluate_all, EnergyVirial};
use crate::grid::{CellGrid, NIL};
use crate::potential::LennardJones;
use crate::system::System;

/// Velocity-Verlet integrator over the cell-partitioned system.
///
/// Owns the full simulation state. Each step runs four phases in a
/// fixed order: half-kick and drift per cell (staging any cross-cell
/// moves), a single commit of all staged migrations, a full force
/// recomputation at the new positions, and the second half-kick with
/// the new forces. Migrating before the force pass keeps the neighbor
/// lists geometrically correct; kicking after it is what makes the
/// scheme symplectic.
#[derive(Debug)]
pub struct VelocityVerlet {
    pub system: System,
    pub grid: CellGrid,
    pub lj: LennardJones,
    pub dt: f64,
    last: EnergyVirial,
}

impl VelocityVerlet {
    /// Build the grid for the system's box, place every atom in its
    /// cell, and evaluate the initial forces.
    pub fn new(system: System, lj: LennardJones, dt: f64) -> Result<Self, String> {
        if dt <= 0.0 {
            return Err("time step must be positive".to_string());
        }
        let mut system = system;
        let mut grid = CellGrid::new(system.box_len, lj.r_cut, system.n_atoms())?;
        grid.rebuild(&system.positions);
        let last = evaluate_all(&mut system, &grid, &lj);
        Ok(VelocityVerlet {
            system,
            grid,
            lj,
            dt,
            last,
        })
    }

    /// Potential and virial from the most recent force evaluation.
    pub fn last_totals(&self) -> EnergyVirial {
        self.last
    }

    /// Advance the system by one full Velocity-Verlet step.
    pub fn full_step(&mut self) {
        self.first_half();
        self.grid.commit_migrations();
        self.last = evaluate_all(&mut self.system, &self.grid, &self.lj);
        self.second_half();
    }

    /// First half-kick plus drift, cell by cell. Atoms that cross a
    /// cell boundary are unlinked from their source list and staged for
    /// the destination; the live destination lists are untouched until
    /// the commit, so no atom is drifted twice and no list is read
    /// mid-mutation.
    fn first_half(&mut self) {
        let half_dt = 0.5 * self.dt;
        self.grid.begin_migration();
        for cell in 0..self.grid.n_cells() {
            let mut prev: Option<usize> = None;
            let mut cur = self.grid.head(cell);
            while cur != NIL {
                let after = self.grid.next_of(cur);

                self.system.velocities[cur] += self.system.forces[cur] * half_dt;
                let dr = self.system.velocities[cur] * self.dt;
                self.system.true_positions[cur] += dr;
                let wrapped = self.system.wrap(self.system.positions[cur] + dr);
                self.system.positions[cur] = wrapped;

                let dest = self.grid.cell_of_position(&wrapped);
                if dest != cell {
                    self.grid.remove(cell, cur, prev);
                    self.grid.stage_handoff(dest, cur);
                } else {
                    prev = Some(cur);
                }
                cur = after;
            }
        }
    }

    /// Second half-kick with the freshly computed forces.
    fn second_half(&mut self) {
        let half_dt = 0.5 * self.dt;
        for (v, f) in izip!(&mut self.system.velocities, &self.system.forces) {
            *v += f * half_dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn free_flight_integrator() -> VelocityVerlet {
        // Two atoms far outside each other's cutoff: forces vanish and
        // the step reduces to straight-line drift.
        let positions = vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(6.0, 6.0, 6.0)];
        let velocities = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0)];
        let system = System::new(positions, velocities, 10.0, 2.0 / 1000.0);
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        VelocityVerlet::new(system, lj, 0.05).unwrap()
    }

    #[test]
    fn test_free_flight_drift() {
        let mut vv = free_flight_integrator();
        for _ in 0..10 {
            vv.full_step();
        }
        assert_relative_eq!(vv.system.positions[0].x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(vv.system.positions[1].x, 5.5, epsilon = 1e-12);
        assert_relative_eq!(vv.system.kinetic_energy(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_migration_keeps_partition() {
        let mut vv = free_flight_integrator();
        // atom 0 starts in cell (0,0,0); after enough steps it crosses
        // into cell (1,0,0) at x = 2.5
        for _ in 0..40 {
            vv.full_step();
            vv.grid.validate_partition(vv.system.n_atoms()).unwrap();
        }
        assert!(vv.grid.transfers() > 0);
        let cell = vv.grid.cell_of(0);
        assert_eq!(cell, vv.grid.cell_of_position(&vv.system.positions[0]));
    }

    #[test]
    fn test_two_body_energy_and_momentum_conservation() {
        // A bound pair oscillating near the potential minimum.
        let positions = vec![Vector3::new(4.0, 5.0, 5.0), Vector3::new(5.2, 5.0, 5.0)];
        let velocities = vec![Vector3::new(0.1, 0.0, 0.0), Vector3::new(-0.1, 0.0, 0.0)];
        let system = System::new(positions, velocities, 10.0, 2.0 / 1000.0);
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let mut vv = VelocityVerlet::new(system, lj, 0.005).unwrap();

        let e0 = vv.system.kinetic_energy() + vv.last_totals().potential;
        let p0 = vv.system.total_momentum();
        for _ in 0..500 {
            vv.full_step();
        }
        let e1 = vv.system.kinetic_energy() + vv.last_totals().potential;
        let p1 = vv.system.total_momentum();
        assert!((e1 - e0).abs() < 1e-5, "energy drifted by {}", e1 - e0);
        assert!((p1 - p0).norm() < 1e-12);
    }

    #[test]
    fn test_unwrapped_positions_track_crossings() {
        let mut vv = free_flight_integrator();
        // atom 1 moves in -x and wraps through the boundary near x = 0
        for _ in 0..150 {
            vv.full_step();
        }
        let expected = 6.0 - 1.0 * 0.05 * 150.0;
        assert_relative_eq!(vv.system.true_positions[1].x, expected, epsilon = 1e-10);
        assert!(vv.system.positions[1].x >= 0.0 && vv.system.positions[1].x < 10.0);
    }
}
