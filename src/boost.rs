//! Boost factors for accelerated MD.
//!
//! Two closed-form laws are implemented:
//!
//! * group aMD: every boosted force group carries its own threshold `e_max`
//!   and strength `alpha`, and its force is scaled by
//!   `(alpha / (alpha + e_max - E))^2` while `E <= e_max`;
//! * multi-basin iaMD: one force group is scaled by a Boltzmann-weighted
//!   mixture of per-basin aMD factors, each basin contributing its own
//!   penalty `dE_i` and free-energy offset `M_i`.
//!
//! Both are plain arithmetic on scalars; the integrator applies the result to
//! the forces.

use serde::{Deserialize, Serialize};

use crate::error::{require_finite, require_len, require_positive, AmdError, Result};
use crate::provider::ForceGroup;

/// Heaviside step with `step(0) = 1`.
#[inline]
fn step(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Force scale of the dual-boost aMD law for one group.
///
/// Returns exactly 1 when `energy > e_max`, including `energy = e_max + alpha`
/// where the unguarded quotient would be `0 * inf`.
#[inline]
pub fn amd_scale(alpha: f64, e_max: f64, energy: f64) -> f64 {
    let de = e_max - energy;
    if step(de) == 0.0 {
        return 1.0;
    }
    let r = alpha / (alpha + de);
    r * r
}

/// Boost parameters of one force group in group aMD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupBoost {
    pub group: ForceGroup,
    pub alpha: f64,
    pub e_max: f64,
}

impl GroupBoost {
    pub fn new(group: ForceGroup, alpha: f64, e_max: f64) -> Result<Self> {
        require_positive("alpha", alpha)?;
        require_finite("e_max", e_max)?;
        Ok(Self {
            group,
            alpha,
            e_max,
        })
    }

    #[inline]
    pub fn scale(&self, energy: f64) -> f64 {
        amd_scale(self.alpha, self.e_max, energy)
    }
}

/// One reference basin of the iaMD mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Basin {
    /// Boost strength `a_i`.
    #[serde(alias = "a")]
    pub alpha: f64,
    /// Reference energy `E_i`.
    #[serde(alias = "e")]
    pub energy: f64,
    /// Free-energy offset `M_i`, updated by adaptive bias controllers.
    #[serde(alias = "m", default)]
    pub offset: f64,
}

impl Basin {
    pub fn new(alpha: f64, energy: f64, offset: f64) -> Result<Self> {
        require_positive("basin alpha", alpha)?;
        require_finite("basin energy", energy)?;
        require_finite("basin offset", offset)?;
        Ok(Self {
            alpha,
            energy,
            offset,
        })
    }

    /// Boost potential `step(E_i - e) (E_i - e)^2 / (a_i + E_i - e)`.
    #[inline]
    pub fn penalty(&self, e: f64) -> f64 {
        let d = self.energy - e;
        if step(d) == 0.0 {
            return 0.0;
        }
        d * d / (self.alpha + d)
    }

    /// Force scale `(a_i / (a_i + step(E_i - e) (E_i - e)))^2`.
    #[inline]
    pub fn scale(&self, e: f64) -> f64 {
        let d = self.energy - e;
        let r = self.alpha / (self.alpha + step(d) * d);
        r * r
    }

    /// Exponent `nbeta (dE_i + M_i)` of the Boltzmann weight.
    #[inline]
    fn log_weight(&self, e: f64, nbeta: f64) -> f64 {
        nbeta * (self.penalty(e) + self.offset)
    }
}

/// How the partition sum of the basin mixture is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixtureEvaluation {
    /// `K = sum(scale_i exp(w_i)) / sum(exp(w_i))` summed as written. `Z` may
    /// underflow to zero (K becomes NaN) or overflow for extreme exponents.
    #[default]
    Literal,
    /// Same quotient with the largest exponent factored out before summing.
    LogSumExp,
}

/// Result of a mixture evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureFactor {
    /// Normalized force scale applied to the boosted group.
    pub k: f64,
    /// Partition sum `Z = sum(exp(nbeta (dE_i + M_i)))`.
    pub z: f64,
}

impl MixtureFactor {
    pub fn is_finite(&self) -> bool {
        self.k.is_finite()
    }
}

/// Boltzmann-weighted mixture of per-basin scale factors at group energy `e`.
///
/// `nbeta` is `-1 / kT`.
pub fn mixture_factor(
    basins: &[Basin],
    e: f64,
    nbeta: f64,
    evaluation: MixtureEvaluation,
) -> MixtureFactor {
    match evaluation {
        MixtureEvaluation::Literal => literal_mixture(basins, e, nbeta),
        MixtureEvaluation::LogSumExp => {
            let w_max = basins
                .iter()
                .map(|b| b.log_weight(e, nbeta))
                .fold(f64::NEG_INFINITY, f64::max);
            if !w_max.is_finite() {
                return literal_mixture(basins, e, nbeta);
            }

            let (mut k, mut z) = (0.0, 0.0);
            for basin in basins {
                let w = (basin.log_weight(e, nbeta) - w_max).exp();
                k += basin.scale(e) * w;
                z += w;
            }
            MixtureFactor {
                k: k / z,
                z: z * w_max.exp(),
            }
        }
    }
}

fn literal_mixture(basins: &[Basin], e: f64, nbeta: f64) -> MixtureFactor {
    let (mut k, mut z) = (0.0, 0.0);
    for basin in basins {
        let exp = basin.log_weight(e, nbeta).exp();
        k += basin.scale(e) * exp;
        z += exp;
    }
    MixtureFactor { k: k / z, z }
}

/// The multi-basin boost of a single force group.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBasinBoost {
    pub group: ForceGroup,
    basins: Vec<Basin>,
    pub evaluation: MixtureEvaluation,
}

impl MultiBasinBoost {
    pub fn new(group: ForceGroup, basins: Vec<Basin>) -> Result<Self> {
        if basins.is_empty() {
            return Err(AmdError::EmptyBoost("multi-basin boost needs at least one basin"));
        }
        for b in &basins {
            Basin::new(b.alpha, b.energy, b.offset)?;
        }
        Ok(Self {
            group,
            basins,
            evaluation: MixtureEvaluation::Literal,
        })
    }

    /// Build the basins from parallel arrays of strengths, reference energies and offsets.
    pub fn from_arrays(
        group: ForceGroup,
        alphas: &[f64],
        energies: &[f64],
        offsets: &[f64],
    ) -> Result<Self> {
        require_len("basin energies", alphas.len(), energies.len())?;
        require_len("basin offsets", alphas.len(), offsets.len())?;
        let basins = alphas
            .iter()
            .zip(energies)
            .zip(offsets)
            .map(|((&a, &e), &m)| Basin::new(a, e, m))
            .collect::<Result<Vec<_>>>()?;
        Self::new(group, basins)
    }

    pub fn with_evaluation(mut self, evaluation: MixtureEvaluation) -> Self {
        self.evaluation = evaluation;
        self
    }

    pub fn basins(&self) -> &[Basin] {
        &self.basins
    }

    pub fn offsets(&self) -> Vec<f64> {
        self.basins.iter().map(|b| b.offset).collect()
    }

    /// Overwrite every basin's free-energy offset.
    pub fn set_offsets(&mut self, offsets: &[f64]) -> Result<()> {
        require_len("basin offsets", self.basins.len(), offsets.len())?;
        for &m in offsets {
            require_finite("basin offset", m)?;
        }
        for (basin, &m) in self.basins.iter_mut().zip(offsets) {
            basin.offset = m;
        }
        Ok(())
    }

    pub fn factor(&self, e: f64, nbeta: f64) -> MixtureFactor {
        mixture_factor(&self.basins, e, nbeta, self.evaluation)
    }
}

/// The boost law an integrator applies.
#[derive(Debug, Clone, PartialEq)]
pub enum BoostKind {
    GroupAmd(Vec<GroupBoost>),
    MultiBasin(MultiBasinBoost),
}

impl BoostKind {
    pub fn group_amd(boosts: Vec<GroupBoost>) -> Result<Self> {
        if boosts.is_empty() {
            return Err(AmdError::EmptyBoost("group aMD needs at least one boosted group"));
        }
        for b in &boosts {
            GroupBoost::new(b.group, b.alpha, b.e_max)?;
        }
        Ok(BoostKind::GroupAmd(boosts))
    }

    /// Force groups whose forces are scaled, in evaluation order.
    pub fn boosted_groups(&self) -> Vec<ForceGroup> {
        match self {
            BoostKind::GroupAmd(boosts) => boosts.iter().map(|b| b.group).collect(),
            BoostKind::MultiBasin(mb) => vec![mb.group],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermostat::thermal_energy;
    use approx::assert_relative_eq;

    const G: ForceGroup = ForceGroup(1);

    #[test]
    fn test_scale_is_one_at_and_above_threshold() {
        let boost = GroupBoost::new(G, 10.0, 0.0).unwrap();
        assert_eq!(boost.scale(0.0), 1.0);
        assert_eq!(boost.scale(5.0), 1.0);
        assert_eq!(boost.scale(1e12), 1.0);
    }

    #[test]
    fn test_scale_at_threshold_plus_alpha() {
        // alpha + dE vanishes here
        assert_eq!(amd_scale(10.0, 0.0, 10.0), 1.0);
        assert_eq!(GroupBoost::new(G, 2.5, -1.0).unwrap().scale(1.5), 1.0);
    }

    #[test]
    fn test_scale_below_threshold() {
        let boost = GroupBoost::new(G, 10.0, 0.0).unwrap();
        // dE = 10 -> (10 / 20)^2
        assert_relative_eq!(boost.scale(-10.0), 0.25, epsilon = 1e-15);
        // monotone compression as the energy drops further
        assert!(boost.scale(-20.0) < boost.scale(-10.0));
        assert!(boost.scale(-1.0) > 0.0 && boost.scale(-1.0) < 1.0);
    }

    #[test]
    fn test_large_alpha_vanishing_boost() {
        let e = -50.0;
        let mut previous = 0.0;
        for alpha in [1e2, 1e4, 1e6, 1e8] {
            let s = amd_scale(alpha, 0.0, e);
            assert!(s > previous);
            previous = s;
        }
        assert_relative_eq!(amd_scale(1e8, 0.0, e), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_boost_parameters() {
        assert!(GroupBoost::new(G, 0.0, 1.0).is_err());
        assert!(GroupBoost::new(G, -3.0, 1.0).is_err());
        assert!(GroupBoost::new(G, 1.0, f64::NAN).is_err());
        assert!(BoostKind::group_amd(vec![]).is_err());
        assert!(Basin::new(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_basin_terms() {
        let basin = Basin::new(4.0, 10.0, 0.0).unwrap();
        // below the reference: d = 6
        assert_relative_eq!(basin.penalty(4.0), 36.0 / 10.0, epsilon = 1e-15);
        assert_relative_eq!(basin.scale(4.0), (4.0f64 / 10.0).powi(2), epsilon = 1e-15);
        // above the reference the basin is inert
        assert_eq!(basin.penalty(12.0), 0.0);
        assert_eq!(basin.scale(12.0), 1.0);
        // e = E_i + a_i
        assert_eq!(basin.penalty(14.0), 0.0);
        assert_eq!(basin.scale(14.0), 1.0);
    }

    #[test]
    fn test_mixture_finite_at_basin_pole() {
        let nbeta = -1.0 / thermal_energy(300.0);
        let boost = MultiBasinBoost::from_arrays(G, &[4.0, 2.0], &[10.0, 0.0], &[0.0, 1.0]).unwrap();
        let factor = boost.factor(14.0, nbeta);
        assert!(factor.is_finite());
        assert_eq!(factor.k, 1.0);
    }

    #[test]
    fn test_single_basin_mixture_reduces_to_scale() {
        let nbeta = -1.0 / thermal_energy(300.0);
        let boost = MultiBasinBoost::from_arrays(G, &[50.0], &[-100.0], &[3.0]).unwrap();
        let basin = boost.basins()[0];
        for e in [-400.0, -150.0, -100.0, -20.0, 40.0] {
            let f = boost.factor(e, nbeta);
            assert_relative_eq!(f.k, basin.scale(e), max_relative = 1e-15);
            assert_relative_eq!(f.z, (nbeta * (basin.penalty(e) + 3.0)).exp(), max_relative = 1e-15);
        }
    }

    #[test]
    fn test_duplicate_basins_are_invariant() {
        let basin = Basin::new(20.0, -30.0, 1.5).unwrap();
        let boost = MultiBasinBoost::new(G, vec![basin, basin]).unwrap();
        for nbeta in [-0.01, -0.4, -2.0, -10.0] {
            for e in [-80.0, -31.0, -30.0, 0.0] {
                assert_relative_eq!(boost.factor(e, nbeta).k, basin.scale(e), max_relative = 1e-14);
            }
        }
    }

    #[test]
    fn test_two_basin_mixture_by_hand() {
        let nbeta: f64 = -0.5;
        let b1 = Basin::new(10.0, 0.0, 0.0).unwrap();
        let b2 = Basin::new(5.0, -2.0, 1.0).unwrap();
        let boost = MultiBasinBoost::new(G, vec![b1, b2]).unwrap();
        let e = -4.0;

        // basin 1: d = 4, dE = 16/14, scale = (10/14)^2
        let w1 = (nbeta * (16.0 / 14.0)).exp();
        let s1 = (10.0f64 / 14.0).powi(2);
        // basin 2: d = 2, dE = 4/7, scale = (5/7)^2, offset 1
        let w2 = (nbeta * (4.0 / 7.0 + 1.0)).exp();
        let s2 = (5.0f64 / 7.0).powi(2);

        let f = boost.factor(e, nbeta);
        assert_relative_eq!(f.z, w1 + w2, epsilon = 1e-14);
        assert_relative_eq!(f.k, (s1 * w1 + s2 * w2) / (w1 + w2), epsilon = 1e-14);
        assert!(f.k > s2.min(s1) && f.k < s2.max(s1));
    }

    #[test]
    fn test_log_sum_exp_matches_literal() {
        let nbeta = -1.0 / thermal_energy(310.0);
        let basins = vec![
            Basin::new(80.0, -500.0, 0.0).unwrap(),
            Basin::new(120.0, -450.0, 2.5).unwrap(),
            Basin::new(60.0, -520.0, -1.0).unwrap(),
        ];
        for e in [-600.0, -510.0, -480.0, -400.0] {
            let literal = mixture_factor(&basins, e, nbeta, MixtureEvaluation::Literal);
            let stable = mixture_factor(&basins, e, nbeta, MixtureEvaluation::LogSumExp);
            assert_relative_eq!(literal.k, stable.k, max_relative = 1e-12);
            assert_relative_eq!(literal.z, stable.z, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_literal_underflow_is_preserved() {
        let nbeta = -1.0 / thermal_energy(300.0);
        let basins = vec![
            Basin::new(1.0, 1e6, 0.0).unwrap(),
            Basin::new(2.0, 1e6, 0.0).unwrap(),
        ];
        let literal = mixture_factor(&basins, 0.0, nbeta, MixtureEvaluation::Literal);
        assert_eq!(literal.z, 0.0);
        assert!(literal.k.is_nan());
        assert!(!literal.is_finite());

        let stable = mixture_factor(&basins, 0.0, nbeta, MixtureEvaluation::LogSumExp);
        assert!(stable.is_finite());
        assert!(stable.k > 0.0 && stable.k < 1e-6);
    }

    #[test]
    fn test_set_offsets() {
        let mut boost =
            MultiBasinBoost::from_arrays(G, &[1.0, 2.0], &[0.0, 1.0], &[0.0, 0.0]).unwrap();
        boost.set_offsets(&[4.0, -2.5]).unwrap();
        assert_eq!(boost.offsets(), vec![4.0, -2.5]);

        assert!(matches!(
            boost.set_offsets(&[1.0]),
            Err(AmdError::LengthMismatch { expected: 2, found: 1, .. })
        ));
        assert!(boost.set_offsets(&[1.0, f64::INFINITY]).is_err());
        assert_eq!(boost.offsets(), vec![4.0, -2.5]);
    }

    #[test]
    fn test_mismatched_basin_arrays() {
        assert!(MultiBasinBoost::from_arrays(G, &[1.0, 2.0], &[0.0], &[0.0, 0.0]).is_err());
        assert!(MultiBasinBoost::from_arrays(G, &[1.0], &[0.0], &[0.0, 1.0]).is_err());
        assert!(matches!(
            MultiBasinBoost::from_arrays(G, &[], &[], &[]),
            Err(AmdError::EmptyBoost(_))
        ));
    }
}
