use nalgebra::Vector3;

/// Lennard-Jones pair interaction in reduced units (sigma = epsilon = 1).
///
/// The potential is truncated at `r_cut` and shifted so it vanishes at
/// the cutoff, keeping the total energy continuous when pairs cross the
/// cutoff sphere. Below the squared separation `r_small2` both force and
/// potential are held flat at their `r_small2` values, which prevents
/// numerical blow-up from near-overlapping atoms without introducing a
/// discontinuity at the clamp boundary.
#[derive(Debug, Clone)]
pub struct LennardJones {
    pub r_cut: f64,
    pub r_cut2: f64,
    pub r_small2: f64,
    box_len: f64,
    /// Unshifted potential at the cutoff, subtracted from every pair.
    u_shift: f64,
}

impl LennardJones {
    pub fn new(r_cut: f64, r_small2: f64, box_len: f64) -> Self {
        let r_cut2 = r_cut * r_cut;
        let u_shift = raw_potential(r_cut2);
        LennardJones {
            r_cut,
            r_cut2,
            r_small2,
            box_len,
            u_shift,
        }
    }

    /// Apply the minimum-image convention for the cubic periodic box.
    #[inline]
    pub fn minimum_image(&self, mut d: Vector3<f64>) -> Vector3<f64> {
        let l = self.box_len;
        for k in 0..3 {
            d[k] -= l * (d[k] / l).round();
        }
        d
    }

    /// Force scalar and pair potential at squared separation `r2`.
    ///
    /// The force scalar multiplies the separation vector, so the vector
    /// force on atom i from atom j is `(r_i - r_j) * f`. Positive values
    /// are repulsive.
    #[inline]
    pub fn pair_force_potential(&self, r2: f64) -> (f64, f64) {
        let r2 = r2.max(self.r_small2);
        let inv_r2 = 1.0 / r2;
        let inv_r6 = inv_r2 * inv_r2 * inv_r2;
        let f = 48.0 * inv_r6 * (inv_r6 - 0.5) * inv_r2;
        let u = 4.0 * inv_r6 * (inv_r6 - 1.0) - self.u_shift;
        (f, u)
    }
}

/// Unshifted Lennard-Jones potential at squared separation `r2`.
#[inline]
fn raw_potential(r2: f64) -> f64 {
    let inv_r2 = 1.0 / r2;
    let inv_r6 = inv_r2 * inv_r2 * inv_r2;
    4.0 * inv_r6 * (inv_r6 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_potential_minimum() {
        // Minimum of the LJ curve sits at r = 2^(1/6), depth -1 before the
        // cutoff shift.
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let r2_min = 2.0_f64.powf(1.0 / 3.0);
        let (f, u) = lj.pair_force_potential(r2_min);
        assert_relative_eq!(f, 0.0, epsilon = 1e-12);
        assert_relative_eq!(u, -1.0 - raw_potential(lj.r_cut2), epsilon = 1e-12);
    }

    #[test]
    fn test_potential_vanishes_at_cutoff() {
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let (_, u) = lj.pair_force_potential(lj.r_cut2);
        assert_relative_eq!(u, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_regularization_continuity() {
        // Approaching the clamp boundary from above and below must give
        // the same force and potential.
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let at = lj.pair_force_potential(0.01);
        let below = lj.pair_force_potential(0.005);
        let above = lj.pair_force_potential(0.01 + 1e-15);
        assert_relative_eq!(at.0, below.0, epsilon = 1e-12);
        assert_relative_eq!(at.1, below.1, epsilon = 1e-12);
        assert_relative_eq!(at.0, above.0, max_relative = 1e-9);
        assert_relative_eq!(at.1, above.1, max_relative = 1e-9);
    }

    #[test]
    fn test_minimum_image() {
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let d = lj.minimum_image(Vector3::new(9.0, -6.0, 4.0));
        assert_relative_eq!(d.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 4.0, epsilon = 1e-12);
        assert_relative_eq!(d.z, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repulsive_inside_minimum() {
        let lj = LennardJones::new(2.5, 0.01, 10.0);
        let (f, _) = lj.pair_force_potential(0.81);
        assert!(f > 0.0);
    }
}
