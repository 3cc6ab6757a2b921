//! Run driver: owns the state and collaborators and advances them step by step.

use tracing::{debug, info, warn};

use crate::config::TemperatureSchedule;
use crate::constraints::NoConstraints;
use crate::error::Result;
use crate::integrator::{Integrator, StepEnv, StepRecord};
use crate::provider::{ConstraintProjector, ForceGroupProvider, GaussianNoise, NoiseSource};
use crate::reporter::EnergyReporter;
use crate::state::ParticleState;
use crate::thermostat::BOLTZMANN_KJ_PER_MOL_K;

pub struct Simulation<P, I> {
    state: ParticleState,
    provider: P,
    integrator: I,
    constraints: Box<dyn ConstraintProjector>,
    noise: Box<dyn NoiseSource>,
    reporters: Vec<EnergyReporter<'static>>,
    schedule: Option<TemperatureSchedule>,
    current_step: u64,
}

impl<P: ForceGroupProvider, I: Integrator> Simulation<P, I> {
    /// Unconstrained simulation with entropy-seeded thermal noise.
    pub fn new(state: ParticleState, provider: P, integrator: I) -> Self {
        Self {
            state,
            provider,
            integrator,
            constraints: Box::new(NoConstraints),
            noise: Box::new(GaussianNoise::from_entropy()),
            reporters: Vec::new(),
            schedule: None,
            current_step: 0,
        }
    }

    pub fn with_constraints(mut self, constraints: Box<dyn ConstraintProjector>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_noise(mut self, noise: Box<dyn NoiseSource>) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_reporter(mut self, reporter: EnergyReporter<'static>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Bath temperature follows `schedule`, applied before every step.
    pub fn with_schedule(mut self, schedule: TemperatureSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn state(&self) -> &ParticleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ParticleState {
        &mut self.state
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    /// Access for external controllers, e.g. to update basin offsets between steps.
    pub fn integrator_mut(&mut self) -> &mut I {
        &mut self.integrator
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Particle degrees of freedom less one per constraint.
    pub fn degrees_of_freedom(&self) -> usize {
        self.state
            .degrees_of_freedom()
            .saturating_sub(self.constraints.constraint_count())
    }

    /// Instantaneous temperature `2 KE / (dof kB)`.
    pub fn kinetic_temperature(&self) -> f64 {
        let dof = self.degrees_of_freedom();
        if dof == 0 {
            return 0.0;
        }
        2.0 * self.state.kinetic_energy() / (dof as f64 * BOLTZMANN_KJ_PER_MOL_K)
    }

    /// Advance one step, then write every report that falls due.
    pub fn step(&mut self) -> Result<StepRecord> {
        if let Some(schedule) = &self.schedule {
            let target = schedule.temperature_at(self.current_step);
            if target != self.integrator.thermostat().temperature() {
                self.integrator.set_temperature(target)?;
            }
        }

        let mut env = StepEnv {
            forces: &self.provider,
            constraints: self.constraints.as_ref(),
            noise: self.noise.as_mut(),
        };
        let record = self.integrator.step(&mut self.state, &mut env)?;
        self.current_step += 1;

        if let Some(mixture) = &record.mixture {
            if !mixture.is_finite() {
                warn!(
                    "Step {}: non-finite mixture factor K={} (Z={})",
                    self.current_step, mixture.k, mixture.z
                );
            }
        }

        for reporter in &mut self.reporters {
            if reporter.is_due(self.current_step) {
                let energies = reporter.report(&self.provider, &self.state.positions)?;
                debug!("Step {}: group energies {:?}", self.current_step, energies);
            }
        }

        Ok(record)
    }

    /// Advance `n_steps` steps, stopping at the first error.
    pub fn run(&mut self, n_steps: u64) -> Result<()> {
        info!(
            "Running {} steps of {} ps from step {}",
            n_steps,
            self.integrator.time_step(),
            self.current_step
        );
        let log_every = (n_steps / 10).max(1);
        for i in 1..=n_steps {
            let record = self.step()?;
            if i % log_every == 0 {
                let scales: Vec<f64> = record.boosted.iter().map(|b| b.scale).collect();
                info!(
                    "Step {}: T = {:.2} K, boost scales {:?}",
                    self.current_step,
                    self.kinetic_temperature(),
                    scales
                );
            }
        }
        Ok(())
    }

    /// Finalize all reporters, closing the files they opened.
    pub fn finish(self) -> Result<ParticleState> {
        for reporter in self.reporters {
            reporter.close()?;
        }
        Ok(self.state)
    }
}
