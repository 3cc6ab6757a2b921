//! Step sequencer of the accelerated Langevin integrators.
//!
//! One call to [`Integrator::step`] runs, in order:
//!
//! 1. the Langevin kick `v = vscale*v + noisescale*g/sqrt(m)`;
//! 2. the boosted force groups, `v += fscale*f*scale/m`;
//! 3. the plain force groups, `v += fscale*f/m`;
//! 4. the drift `x += dt*v` from a snapshot of the old positions;
//! 5. the constraint projection;
//! 6. the velocity reconstruction `v = (x - x_old)/dt`.

use crate::boost::{BoostKind, GroupBoost, MixtureFactor, MultiBasinBoost};
use crate::error::{require_len, require_positive, AmdError, Result};
use crate::provider::{
    ConstraintProjector, ForceGroup, ForceGroupProvider, GroupEvaluation, NoiseSource,
};
use crate::state::ParticleState;
use crate::thermostat::{thermal_energy, LangevinThermostat};

/// The collaborators consulted during one step.
pub struct StepEnv<'a> {
    pub forces: &'a dyn ForceGroupProvider,
    pub constraints: &'a dyn ConstraintProjector,
    pub noise: &'a mut dyn NoiseSource,
}

/// Energy and applied force scale of one boosted group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostedGroup {
    pub group: ForceGroup,
    pub energy: f64,
    pub scale: f64,
}

/// Scalars computed during the last step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepRecord {
    pub boosted: Vec<BoostedGroup>,
    /// Mixture factor and partition sum, multi-basin boost only.
    pub mixture: Option<MixtureFactor>,
}

pub trait Integrator {
    /// Advance `state` by one time step.
    fn step(&mut self, state: &mut ParticleState, env: &mut StepEnv<'_>) -> Result<StepRecord>;

    /// Change the bath temperature between steps.
    fn set_temperature(&mut self, temperature: f64) -> Result<()>;

    fn thermostat(&self) -> &LangevinThermostat;

    fn time_step(&self) -> f64 {
        self.thermostat().time_step()
    }
}

/// Langevin integrator with a group-aMD or multi-basin iaMD boost.
#[derive(Debug, Clone)]
pub struct AcceleratedIntegrator {
    thermostat: LangevinThermostat,
    boost: BoostKind,
    plain_groups: Vec<ForceGroup>,
    nbeta: f64,
}

impl AcceleratedIntegrator {
    pub fn new(
        thermostat: LangevinThermostat,
        boost: BoostKind,
        plain_groups: Vec<ForceGroup>,
    ) -> Self {
        let nbeta = -1.0 / thermal_energy(thermostat.temperature());
        Self {
            thermostat,
            boost,
            plain_groups,
            nbeta,
        }
    }

    /// Group aMD: each group in `boosted` is scaled with its own
    /// `(alpha, e_max)`; `plain` groups are integrated unscaled.
    pub fn group_amd(
        temperature: f64,
        friction: f64,
        dt: f64,
        boosted: Vec<GroupBoost>,
        plain: Vec<ForceGroup>,
    ) -> Result<Self> {
        let thermostat = LangevinThermostat::new(temperature, friction, dt)?;
        Ok(Self::new(thermostat, BoostKind::group_amd(boosted)?, plain))
    }

    /// Multi-basin iaMD on one group, with an optional unscaled second group.
    pub fn multi_basin(
        temperature: f64,
        friction: f64,
        dt: f64,
        boost: MultiBasinBoost,
        plain: Option<ForceGroup>,
    ) -> Result<Self> {
        let thermostat = LangevinThermostat::new(temperature, friction, dt)?;
        Ok(Self::new(
            thermostat,
            BoostKind::MultiBasin(boost),
            plain.into_iter().collect(),
        ))
    }

    pub fn boost(&self) -> &BoostKind {
        &self.boost
    }

    pub fn plain_groups(&self) -> &[ForceGroup] {
        &self.plain_groups
    }

    /// `-1/kT` of the basin weights, fixed at construction.
    pub fn nbeta(&self) -> f64 {
        self.nbeta
    }

    /// Re-derive the basin weight factor `-1/kT` at `temperature`.
    ///
    /// [`Integrator::set_temperature`] never calls this; the weights keep
    /// their construction temperature unless a caller asks for it here.
    pub fn rescale_nbeta(&mut self, temperature: f64) -> Result<()> {
        require_positive("temperature", temperature)?;
        self.nbeta = -1.0 / thermal_energy(temperature);
        Ok(())
    }

    pub fn basin_offsets(&self) -> Option<Vec<f64>> {
        match &self.boost {
            BoostKind::MultiBasin(mb) => Some(mb.offsets()),
            BoostKind::GroupAmd(_) => None,
        }
    }

    /// Replace the free-energy offsets `M_i` of every basin.
    pub fn set_basin_offsets(&mut self, offsets: &[f64]) -> Result<()> {
        match &mut self.boost {
            BoostKind::MultiBasin(mb) => mb.set_offsets(offsets),
            BoostKind::GroupAmd(_) => Err(AmdError::Unsupported(
                "basin offsets exist only for the multi-basin boost",
            )),
        }
    }
}

fn evaluate(
    provider: &dyn ForceGroupProvider,
    group: ForceGroup,
    state: &ParticleState,
) -> Result<GroupEvaluation> {
    let eval = provider.forces_and_energy(group, &state.positions);
    require_len("group forces", state.len(), eval.forces.len())?;
    Ok(eval)
}

impl Integrator for AcceleratedIntegrator {
    fn step(&mut self, state: &mut ParticleState, env: &mut StepEnv<'_>) -> Result<StepRecord> {
        let fscale = self.thermostat.coefficients().fscale;
        let dt = self.thermostat.time_step();
        let mut record = StepRecord::default();

        self.thermostat.apply(state, &mut *env.noise);

        match &self.boost {
            BoostKind::GroupAmd(boosts) => {
                for boost in boosts {
                    let eval = evaluate(env.forces, boost.group, state)?;
                    let scale = boost.scale(eval.energy);
                    state.kick(&eval.forces, fscale * scale);
                    record.boosted.push(BoostedGroup {
                        group: boost.group,
                        energy: eval.energy,
                        scale,
                    });
                }
            }
            BoostKind::MultiBasin(mb) => {
                let eval = evaluate(env.forces, mb.group, state)?;
                let mixture = mb.factor(eval.energy, self.nbeta);
                state.kick(&eval.forces, fscale * mixture.k);
                record.boosted.push(BoostedGroup {
                    group: mb.group,
                    energy: eval.energy,
                    scale: mixture.k,
                });
                record.mixture = Some(mixture);
            }
        }

        for &group in &self.plain_groups {
            let eval = evaluate(env.forces, group, state)?;
            state.kick(&eval.forces, fscale);
        }

        state.drift_and_constrain(dt, env.constraints)?;
        Ok(record)
    }

    /// Recomputes `noisescale` only. `nbeta` keeps its construction value;
    /// see [`AcceleratedIntegrator::rescale_nbeta`].
    fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        self.thermostat.set_temperature(temperature)
    }

    fn thermostat(&self) -> &LangevinThermostat {
        &self.thermostat
    }
}
