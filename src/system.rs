use nalgebra::Vector3;

/// State of the N-atom system in reduced Lennard-Jones units.
///
/// All atoms carry unit mass. Positions are kept wrapped into the
/// periodic cubic box `[0, box_len)`; `true_positions` accumulate the
/// unwrapped displacement so the mean square displacement survives
/// periodic wrapping.
#[derive(Debug, Clone)]
pub struct System {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub forces: Vec<Vector3<f64>>,
    /// Positions at setup, fixed for the whole run.
    pub init_positions: Vec<Vector3<f64>>,
    /// Unwrapped positions, ignoring periodic wrap.
    pub true_positions: Vec<Vector3<f64>>,
    /// Edge length of the cubic box.
    pub box_len: f64,
    /// Reduced number density N / V.
    pub density: f64,
}

impl System {
    pub fn new(
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
        box_len: f64,
        density: f64,
    ) -> Self {
        let n = positions.len();
        let init_positions = positions.clone();
        let true_positions = positions.clone();
        System {
            positions,
            velocities,
            forces: vec![Vector3::zeros(); n],
            init_positions,
            true_positions,
            box_len,
            density,
        }
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    /// Degrees of freedom: 3N minus the three constraints from zeroed
    /// total momentum.
    #[inline]
    pub fn dof(&self) -> usize {
        3 * self.n_atoms() - 3
    }

    pub fn volume(&self) -> f64 {
        self.box_len.powi(3)
    }

    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        self.velocities.iter().map(|v| 0.5 * v.dot(v)).sum()
    }

    /// Instantaneous temperature from equipartition, k_B = 1.
    pub fn temperature(&self) -> f64 {
        2.0 * self.kinetic_energy() / self.dof() as f64
    }

    pub fn total_momentum(&self) -> Vector3<f64> {
        self.velocities.iter().sum()
    }

    pub fn center_of_mass(&self) -> Vector3<f64> {
        self.positions.iter().sum::<Vector3<f64>>() / self.n_atoms() as f64
    }

    /// Sum of all internal forces; should vanish for a closed system.
    pub fn force_sum(&self) -> Vector3<f64> {
        self.forces.iter().sum()
    }

    /// Shift the center of mass to the origin. The initial and
    /// unwrapped positions receive the same shift, so displacements and
    /// the mean square displacement are unaffected; wrapped positions
    /// stay inside the box.
    pub fn recenter(&mut self) {
        let r_cm = self.center_of_mass();
        for i in 0..self.n_atoms() {
            self.init_positions[i] -= r_cm;
            self.true_positions[i] -= r_cm;
            let wrapped = self.wrap(self.positions[i] - r_cm);
            self.positions[i] = wrapped;
        }
    }

    /// Remove center-of-mass motion.
    pub fn zero_momentum(&mut self) {
        let v_cm = self.total_momentum() / self.n_atoms() as f64;
        for v in &mut self.velocities {
            *v -= v_cm;
        }
    }

    /// Rescale velocities so the instantaneous temperature equals `target`.
    pub fn scale_temperature(&mut self, target: f64) {
        let current = self.temperature();
        if current > 0.0 {
            let scale = (target / current).sqrt();
            for v in &mut self.velocities {
                *v *= scale;
            }
        }
    }

    /// Mean square displacement from the initial positions, measured on
    /// the unwrapped trajectory.
    pub fn mean_square_displacement(&self) -> f64 {
        self.true_positions
            .iter()
            .zip(&self.init_positions)
            .map(|(r, r0)| (r - r0).norm_squared())
            .sum::<f64>()
            / self.n_atoms() as f64
    }

    pub fn max_speed(&self) -> f64 {
        self.velocities
            .iter()
            .map(|v| v.norm())
            .fold(0.0, f64::max)
    }

    /// Wrap a coordinate vector into `[0, box_len)`.
    pub fn wrap(&self, mut r: Vector3<f64>) -> Vector3<f64> {
        let l = self.box_len;
        for k in 0..3 {
            r[k] -= l * (r[k] / l).floor();
            // floor can leave r[k] == l when r[k] was a tiny negative number
            if r[k] >= l {
                r[k] = 0.0;
            }
        }
        r
    }
}
