//! Langevin friction-and-noise velocity update shared by both integrators.

use nalgebra::Vector3;

use crate::error::{require_non_negative, require_positive, Result};
use crate::provider::NoiseSource;
use crate::state::ParticleState;

/// Boltzmann constant in kJ/(mol·K).
pub const BOLTZMANN_KJ_PER_MOL_K: f64 = 0.0083144598;

/// Thermal energy kB·T in kJ/mol.
#[inline]
pub fn thermal_energy(temperature: f64) -> f64 {
    BOLTZMANN_KJ_PER_MOL_K * temperature
}

/// Coefficients of the velocity update `v' = vscale*v + noisescale*g/sqrt(m)`
/// and of the force impulse `v += fscale*f/m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatCoefficients {
    pub vscale: f64,
    pub fscale: f64,
    pub noisescale: f64,
}

impl ThermostatCoefficients {
    pub fn new(temperature: f64, friction: f64, dt: f64) -> Self {
        let vscale = (-friction * dt).exp();
        let fscale = if friction == 0.0 {
            dt
        } else {
            (1.0 - vscale) / friction
        };
        Self {
            vscale,
            fscale,
            noisescale: noise_scale(temperature, vscale),
        }
    }
}

fn noise_scale(temperature: f64, vscale: f64) -> f64 {
    (thermal_energy(temperature) * (1.0 - vscale * vscale)).sqrt()
}

#[derive(Debug, Clone)]
pub struct LangevinThermostat {
    temperature: f64,
    friction: f64,
    dt: f64,
    coefficients: ThermostatCoefficients,
    noise: Vec<Vector3<f64>>,
}

impl LangevinThermostat {
    /// `temperature` in K, `friction` in 1/ps, `dt` in ps.
    pub fn new(temperature: f64, friction: f64, dt: f64) -> Result<Self> {
        require_positive("temperature", temperature)?;
        require_non_negative("friction", friction)?;
        require_positive("time_step", dt)?;
        Ok(Self {
            temperature,
            friction,
            dt,
            coefficients: ThermostatCoefficients::new(temperature, friction, dt),
            noise: Vec::new(),
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    pub fn coefficients(&self) -> ThermostatCoefficients {
        self.coefficients
    }

    /// Change the bath temperature. Only `noisescale` depends on it.
    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        require_positive("temperature", temperature)?;
        self.temperature = temperature;
        self.coefficients.noisescale = noise_scale(temperature, self.coefficients.vscale);
        Ok(())
    }

    /// Apply friction and a fresh Gaussian kick to every massive particle.
    pub fn apply(&mut self, state: &mut ParticleState, noise: &mut dyn NoiseSource) {
        self.noise.resize(state.len(), Vector3::zeros());
        noise.fill_standard_normal(&mut self.noise);
        state.thermalize(
            &self.noise,
            self.coefficients.vscale,
            self.coefficients.noisescale,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{GaussianNoise, ZeroNoise};
    use approx::assert_relative_eq;

    #[test]
    fn test_frictionless_coefficients() {
        let c = ThermostatCoefficients::new(300.0, 0.0, 0.002);
        assert_eq!(c.fscale, 0.002);
        assert_eq!(c.vscale, 1.0);
        assert_eq!(c.noisescale, 0.0);
    }

    #[test]
    fn test_frictionless_step_is_identity() {
        let mut thermostat = LangevinThermostat::new(300.0, 0.0, 0.002).unwrap();
        let v0 = vec![Vector3::new(0.3, -1.2, 2.5), Vector3::new(1.0, 0.0, -4.0)];
        let mut state =
            ParticleState::new(vec![Vector3::zeros(); 2], v0.clone(), vec![1.0, 12.0]).unwrap();
        thermostat.apply(&mut state, &mut GaussianNoise::from_seed(3));
        assert_eq!(state.velocities, v0);
    }

    #[test]
    fn test_coefficients_with_friction() {
        let (t, gamma, dt) = (300.0, 1.0, 0.002);
        let c = ThermostatCoefficients::new(t, gamma, dt);
        let vscale = (-gamma * dt).exp();
        assert_relative_eq!(c.vscale, vscale, epsilon = 1e-15);
        assert_relative_eq!(c.fscale, (1.0 - vscale) / gamma, epsilon = 1e-15);
        assert_relative_eq!(
            c.noisescale,
            (BOLTZMANN_KJ_PER_MOL_K * t * (1.0 - vscale * vscale)).sqrt(),
            epsilon = 1e-15
        );
        // fscale approaches dt as friction vanishes
        assert_relative_eq!(c.fscale, dt, max_relative = 1e-2);
    }

    #[test]
    fn test_set_temperature_only_touches_noise() {
        let mut thermostat = LangevinThermostat::new(300.0, 2.0, 0.002).unwrap();
        let before = thermostat.coefficients();

        thermostat.set_temperature(600.0).unwrap();
        let after = thermostat.coefficients();
        assert_eq!(after.fscale, before.fscale);
        assert_eq!(after.vscale, before.vscale);
        assert_relative_eq!(after.noisescale, before.noisescale * 2f64.sqrt(), epsilon = 1e-14);

        thermostat.set_temperature(600.0).unwrap();
        assert_eq!(thermostat.coefficients(), after);

        thermostat.set_temperature(300.0).unwrap();
        assert_eq!(
            thermostat.coefficients(),
            ThermostatCoefficients::new(300.0, 2.0, 0.002)
        );
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LangevinThermostat::new(0.0, 1.0, 0.002).is_err());
        assert!(LangevinThermostat::new(300.0, -1.0, 0.002).is_err());
        assert!(LangevinThermostat::new(300.0, 1.0, 0.0).is_err());
        let mut t = LangevinThermostat::new(300.0, 1.0, 0.002).unwrap();
        assert!(t.set_temperature(-5.0).is_err());
        assert_eq!(t.temperature(), 300.0);
    }

    #[test]
    fn test_friction_decays_velocity_without_noise() {
        let mut thermostat = LangevinThermostat::new(300.0, 5.0, 0.01).unwrap();
        let mut state = ParticleState::new(
            vec![Vector3::zeros(); 2],
            vec![Vector3::new(1.0, 0.0, 0.0); 2],
            vec![1.0, 0.0],
        )
        .unwrap();
        thermostat.apply(&mut state, &mut ZeroNoise);
        assert_relative_eq!(state.velocities[0].x, (-0.05f64).exp(), epsilon = 1e-15);
        // virtual site untouched
        assert_eq!(state.velocities[1].x, 1.0);
    }
}
