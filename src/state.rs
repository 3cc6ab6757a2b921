use itertools::izip;
use nalgebra::Vector3;

use crate::error::{require_finite, require_len, AmdError, Result};
use crate::provider::ConstraintProjector;

/// Per-particle state advanced by the integrators.
///
/// Positions, velocities and masses are owned by the caller; the integrator
/// borrows the whole struct mutably for one step at a time. `old_positions`
/// is scratch space overwritten on every step.
///
/// Particles with zero mass are treated as virtual sites: their inverse mass
/// is stored as zero so they receive neither thermal noise nor force impulses.
#[derive(Debug, Clone)]
pub struct ParticleState {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    masses: Vec<f64>,
    inv_masses: Vec<f64>,
    inv_sqrt_masses: Vec<f64>,
    old_positions: Vec<Vector3<f64>>,
}

impl ParticleState {
    pub fn new(
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
        masses: Vec<f64>,
    ) -> Result<Self> {
        let n = positions.len();
        require_len("velocities", n, velocities.len())?;
        require_len("masses", n, masses.len())?;

        for &m in &masses {
            require_finite("mass", m)?;
            if m < 0.0 {
                return Err(AmdError::InvalidParameter {
                    name: "mass",
                    value: m,
                    reason: "must be non-negative (zero marks a virtual site)",
                });
            }
        }

        let inv_masses: Vec<f64> = masses
            .iter()
            .map(|&m| if m > 0.0 { 1.0 / m } else { 0.0 })
            .collect();
        let inv_sqrt_masses = inv_masses.iter().map(|&im| im.sqrt()).collect();

        Ok(Self {
            positions,
            velocities,
            masses,
            inv_masses,
            inv_sqrt_masses,
            old_positions: vec![Vector3::zeros(); n],
        })
    }

    /// State with all particles at rest.
    pub fn at_rest(positions: Vec<Vector3<f64>>, masses: Vec<f64>) -> Result<Self> {
        let velocities = vec![Vector3::zeros(); positions.len()];
        Self::new(positions, velocities, masses)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn inv_masses(&self) -> &[f64] {
        &self.inv_masses
    }

    /// `v = vscale*v + noisescale*g/sqrt(m)`; virtual sites are skipped.
    pub(crate) fn thermalize(&mut self, gaussian: &[Vector3<f64>], vscale: f64, noisescale: f64) {
        for (v, g, &inv_sqrt_m) in izip!(&mut self.velocities, gaussian, &self.inv_sqrt_masses) {
            if inv_sqrt_m == 0.0 {
                continue;
            }
            *v = *v * vscale + g * (noisescale * inv_sqrt_m);
        }
    }

    /// Degrees of freedom of the massive particles, before constraints.
    pub fn degrees_of_freedom(&self) -> usize {
        3 * self.masses.iter().filter(|&&m| m > 0.0).count()
    }

    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        izip!(&self.velocities, &self.masses)
            .map(|(v, &m)| 0.5 * m * v.dot(v))
            .sum()
    }

    /// Accumulate `v += coeff * f / m` for every massive particle.
    pub(crate) fn kick(&mut self, forces: &[Vector3<f64>], coeff: f64) {
        for (v, f, &inv_m) in izip!(&mut self.velocities, forces, &self.inv_masses) {
            *v += f * (coeff * inv_m);
        }
    }

    /// Drift `x += dt*v`, project onto the constraints and rebuild
    /// `v = (x - x_old)/dt` from the constrained displacement.
    ///
    /// Virtual sites are not drifted. A projector failure leaves the state
    /// half-updated and is returned unchanged.
    pub(crate) fn drift_and_constrain(
        &mut self,
        dt: f64,
        constraints: &dyn ConstraintProjector,
    ) -> Result<()> {
        self.old_positions.clone_from(&self.positions);

        for (x, v, &inv_m) in izip!(&mut self.positions, &self.velocities, &self.inv_masses) {
            if inv_m != 0.0 {
                *x += v * dt;
            }
        }

        constraints.project(&self.old_positions, &mut self.positions, &self.inv_masses)?;

        for (v, x, x_old) in izip!(&mut self.velocities, &self.positions, &self.old_positions) {
            *v = (x - x_old) / dt;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_mismatched_lengths() {
        let err = ParticleState::new(
            vec![Vector3::zeros(); 2],
            vec![Vector3::zeros(); 1],
            vec![1.0, 1.0],
        )
        .unwrap_err();
        assert!(matches!(err, AmdError::LengthMismatch { what: "velocities", .. }));

        let err = ParticleState::at_rest(vec![Vector3::zeros(); 2], vec![1.0]).unwrap_err();
        assert!(matches!(err, AmdError::LengthMismatch { what: "masses", .. }));
    }

    #[test]
    fn test_rejects_negative_mass() {
        assert!(ParticleState::at_rest(vec![Vector3::zeros()], vec![-1.0]).is_err());
        assert!(ParticleState::at_rest(vec![Vector3::zeros()], vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_virtual_sites_have_zero_inverse_mass() {
        let state = ParticleState::at_rest(vec![Vector3::zeros(); 2], vec![4.0, 0.0]).unwrap();
        assert_relative_eq!(state.inv_masses()[0], 0.25);
        assert_relative_eq!(state.inv_sqrt_masses[0], 0.5);
        assert_eq!(state.inv_masses()[1], 0.0);
        assert_eq!(state.degrees_of_freedom(), 3);
    }

    #[test]
    fn test_kinetic_energy() {
        let state = ParticleState::new(
            vec![Vector3::zeros(); 2],
            vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0)],
            vec![2.0, 1.0],
        )
        .unwrap();
        assert_relative_eq!(state.kinetic_energy(), 1.0 + 2.0, epsilon = 1e-12);
    }
}
