//! Particle sources.
//!
//! Production runs in two phases so that every source writes into its own
//! contiguous block at the end of the ensemble:
//!
//! ```text
//! before:  [ existing particles ........ ]
//! counts:   source A -> kA, source B -> kB
//! after:   [ existing particles ........ | A: kA | B: kB ]
//!                                        ^start  ^start+kA  ^start+kA+kB
//! ```

use std::ops::Range;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::types::Vec3;

/// A generator of new particles.
pub trait Source {
    /// The number of particles the next call to `produce_particles` will
    /// produce for an interval `dt`.
    ///
    /// Stochastic sources may return different numbers on consecutive calls;
    /// the production protocol queries each source once per interval and
    /// reserves exactly that many slots.
    fn num_particles_produced(&mut self, dt: f64) -> usize;

    /// Write the state of `range.len()` new particles into `range`.
    ///
    /// `range` lies at the end of the ensemble and has already been
    /// allocated. Sources must not touch particles outside of it.
    fn produce_particles(
        &mut self,
        dt: f64,
        range: Range<usize>,
        ensemble: &mut Ensemble,
    ) -> Result<()>;
}

/// Insert the particles produced by `sources` into `ensemble`.
///
/// Each source is asked for its count exactly once; the ensemble grows by
/// the total, and the sources then fill consecutive slices in list order.
/// Returns the number of particles added.
pub fn produce_particles(
    dt: f64,
    ensemble: &mut Ensemble,
    sources: &mut [Box<dyn Source>],
) -> Result<usize> {
    let counts: Vec<usize> = sources
        .iter_mut()
        .map(|source| source.num_particles_produced(dt))
        .collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Ok(0);
    }

    let mut start = ensemble.num_particles();
    ensemble.resize(start + total);
    for (source, count) in sources.iter_mut().zip(counts) {
        source.produce_particles(dt, start..start + count, ensemble)?;
        start += count;
    }

    debug!("sources produced {total} particles over dt={dt}");
    Ok(total)
}

/// Parameters of a [`PointSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSourceParams {
    /// Mean number of particles emitted per unit time.
    pub rate: f64,
    /// Where particles are created.
    pub position: Vec3,
    /// Mean velocity of new particles.
    pub velocity: Vec3,
    /// Standard deviation of each velocity component.
    #[serde(default)]
    pub velocity_spread: f64,
}

/// Emits a Poisson-distributed number of particles from a single point.
///
/// Particle velocities are drawn from an isotropic Gaussian around the mean
/// velocity.
#[derive(Debug, Clone)]
pub struct PointSource {
    params: PointSourceParams,
    rng: ChaCha8Rng,
}

impl PointSource {
    pub fn new(params: PointSourceParams) -> Result<Self> {
        Self::with_rng(params, ChaCha8Rng::from_entropy())
    }

    pub fn with_seed(params: PointSourceParams, seed: u64) -> Result<Self> {
        Self::with_rng(params, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(params: PointSourceParams, rng: ChaCha8Rng) -> Result<Self> {
        if !(params.rate.is_finite() && params.rate >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "source rate must be finite and non-negative, got {}",
                params.rate
            )));
        }
        if !(params.velocity_spread.is_finite() && params.velocity_spread >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "source velocity spread must be finite and non-negative, got {}",
                params.velocity_spread
            )));
        }
        Ok(Self { params, rng })
    }

    pub fn params(&self) -> &PointSourceParams {
        &self.params
    }
}

impl Source for PointSource {
    fn num_particles_produced(&mut self, dt: f64) -> usize {
        let mean = self.params.rate * dt;
        if !mean.is_finite() || mean <= 0.0 {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(poisson) => {
                let count: f64 = poisson.sample(&mut self.rng);
                count as usize
            }
            Err(_) => 0,
        }
    }

    fn produce_particles(
        &mut self,
        _dt: f64,
        range: Range<usize>,
        ensemble: &mut Ensemble,
    ) -> Result<()> {
        let spread = self.params.velocity_spread;
        for x in &mut ensemble.positions_mut()[range.clone()] {
            *x = self.params.position;
        }
        for v in &mut ensemble.velocities_mut()[range] {
            let noise = Vec3::new(
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
            );
            *v = self.params.velocity + noise * spread;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
