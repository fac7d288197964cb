//! Radiation pressure on two-level atoms undergoing resonance fluorescence.
//!
//! Each scattered photon kicks the atom by one recoil momentum `hbar k`
//! along the laser and by a randomly oriented recoil on emission. Over a
//! step we expect
//!
//! ```text
//!                   gamma    (gamma/2)^2
//! nbar = dt * s * ------- * --------------------------------
//!                  2 pi     (gamma/2)^2 (1 + 2 s) + delta^2
//! ```
//!
//! scattered photons (Lorentzian lineshape with saturation broadening). The
//! mean impulse is `nbar * hbar k`. The fluctuating part is a random walk of
//! `nbar` steps of length `|hbar k|` in 3D momentum space, approximated by a
//! Gaussian with standard deviation `sqrt(nbar / 3) * |hbar k|` per
//! component.
//!
//! The laser wave vector is constant and the beam is not attenuated, so the
//! model is limited to optically thin samples. It captures Doppler cooling
//! with counter-propagating red-detuned beams at low total saturation, but
//! not sub-Doppler mechanisms.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::integrator::Force;
use crate::profiles::{DetuningProfile, IntensityProfile};
use crate::types::Vec3;

/// Radiation pressure from a single monochromatic laser beam.
#[derive(Debug, Clone)]
pub struct RadiationPressure<I, D> {
    gamma: f64,
    hbar_k: Vec3,
    intensity: I,
    detuning: D,
    rng: ChaCha8Rng,
}

impl<I, D> RadiationPressure<I, D>
where
    I: IntensityProfile,
    D: DetuningProfile,
{
    /// Create a beam with decay rate `gamma`, single-photon recoil momentum
    /// `hbar_k`, and the given intensity and detuning profiles.
    ///
    /// The recoil noise is seeded from the operating system; use
    /// [`RadiationPressure::with_seed`] for reproducible runs.
    pub fn new(gamma: f64, hbar_k: Vec3, intensity: I, detuning: D) -> Result<Self> {
        Self::with_rng(gamma, hbar_k, intensity, detuning, ChaCha8Rng::from_entropy())
    }

    pub fn with_seed(
        gamma: f64,
        hbar_k: Vec3,
        intensity: I,
        detuning: D,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(gamma, hbar_k, intensity, detuning, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(
        gamma: f64,
        hbar_k: Vec3,
        intensity: I,
        detuning: D,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "decay rate gamma must be positive and finite, got {gamma}"
            )));
        }
        if !hbar_k.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "recoil momentum must be finite, got {hbar_k:?}"
            )));
        }
        Ok(Self {
            gamma,
            hbar_k,
            intensity,
            detuning,
            rng,
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn hbar_k(&self) -> Vec3 {
        self.hbar_k
    }

    /// Expected number of photons scattered over `dt` at saturation
    /// parameter `s` and detuning `delta`.
    pub fn expected_scattering(&self, dt: f64, s: f64, delta: f64) -> f64 {
        let half_gamma_sq = (0.5 * self.gamma).powi(2);
        let lineshape = half_gamma_sq / (half_gamma_sq * (1.0 + 2.0 * s) + delta * delta);
        dt * s * (self.gamma / (2.0 * PI)) * lineshape
    }

    /// Expected photon counts for every particle of `ensemble`.
    pub fn scattered_photons(&self, dt: f64, ensemble: &Ensemble) -> Result<Vec<f64>> {
        let n = ensemble.num_particles();
        let intensities = self.intensity.intensities(ensemble.positions());
        if intensities.len() != n {
            return Err(Error::shape("intensities", n, intensities.len()));
        }
        let detunings = self.detuning.detunings(ensemble.positions(), ensemble.velocities());
        if detunings.len() != n {
            return Err(Error::shape("detunings", n, detunings.len()));
        }

        intensities
            .iter()
            .zip(&detunings)
            .enumerate()
            .map(|(i, (&s, &delta))| {
                let nbar = self.expected_scattering(dt, s, delta);
                if nbar.is_finite() && nbar >= 0.0 {
                    Ok(nbar)
                } else {
                    Err(Error::NumericalAnomaly(format!(
                        "expected photon count {nbar} for particle {i} (s={s}, delta={delta})"
                    )))
                }
            })
            .collect()
    }
}

impl<I, D> Force for RadiationPressure<I, D>
where
    I: IntensityProfile,
    D: DetuningProfile,
{
    fn force(&mut self, dt: f64, ensemble: &Ensemble, impulses: &mut [Vec3]) -> Result<()> {
        if impulses.len() != ensemble.num_particles() {
            return Err(Error::shape("impulses", ensemble.num_particles(), impulses.len()));
        }
        let nbars = self.scattered_photons(dt, ensemble)?;

        let recoil = self.hbar_k.magnitude();
        for (f, nbar) in impulses.iter_mut().zip(nbars) {
            if nbar == 0.0 {
                continue;
            }
            let kick = Vec3::new(
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
            );
            *f += self.hbar_k * nbar + kick * ((nbar / 3.0).sqrt() * recoil);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{DopplerDetuning, UniformIntensity};
    use approx::assert_relative_eq;

    fn beam(s: f64, delta0: f64, seed: u64) -> RadiationPressure<UniformIntensity, DopplerDetuning> {
        RadiationPressure::with_seed(
            1.0,
            Vec3::new(0.0, 0.0, 1.0),
            UniformIntensity { s },
            DopplerDetuning {
                delta0,
                k: Vec3::new(0.0, 0.0, 1.0),
            },
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_gamma() {
        for gamma in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = RadiationPressure::new(
                gamma,
                Vec3::new(1.0, 0.0, 0.0),
                UniformIntensity { s: 1.0 },
                DopplerDetuning {
                    delta0: 0.0,
                    k: Vec3::ZERO,
                },
            );
            assert!(matches!(result, Err(Error::InvalidConfiguration(_))), "gamma={gamma}");
        }
    }

    #[test]
    fn test_resonant_scattering_rate() {
        // On resonance with s = 1: rate = gamma/(2 pi) * 1/3 per unit s.
        let force = beam(1.0, 0.0, 0);
        assert_relative_eq!(force.expected_scattering(2.0, 1.0, 0.0), 2.0 / (2.0 * PI) / 3.0);
        // Saturates at gamma / (4 pi) for very high intensity.
        assert_relative_eq!(
            force.expected_scattering(1.0, 1e9, 0.0),
            1.0 / (4.0 * PI),
            max_relative = 1e-6
        );
        // Detuning reduces scattering.
        assert!(force.expected_scattering(1.0, 1.0, 2.0) < force.expected_scattering(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_zero_intensity_gives_zero_force() {
        let mut force = beam(0.0, -0.5, 1);
        let mut ensemble = Ensemble::new(5);
        ensemble.velocities_mut()[2] = Vec3::new(0.0, 0.0, 3.0);

        let nbars = force.scattered_photons(0.1, &ensemble).unwrap();
        assert!(nbars.iter().all(|&n| n == 0.0));

        let mut impulses = vec![Vec3::new(1.0, 2.0, 3.0); 5];
        force.force(0.1, &ensemble, &mut impulses).unwrap();
        assert!(impulses.iter().all(|f| *f == Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_mean_impulse_along_beam() {
        let mut force = beam(0.5, -0.5, 7);
        let n = 20_000;
        let ensemble = Ensemble::new(n);
        let mut impulses = vec![Vec3::ZERO; n];

        force.force(10.0, &ensemble, &mut impulses).unwrap();

        let nbar = force.expected_scattering(10.0, 0.5, -0.5);
        let mean = impulses.iter().copied().sum::<Vec3>() / n as f64;
        // Per-component noise has sigma sqrt(nbar / 3); the mean of n draws
        // shrinks that by sqrt(n).
        let tolerance = 5.0 * (nbar / 3.0).sqrt() / (n as f64).sqrt();
        assert!((mean.z - nbar).abs() < tolerance, "mean {mean:?}, nbar {nbar}");
        assert!(mean.x.abs() < tolerance);
        assert!(mean.y.abs() < tolerance);

        let var_x = impulses.iter().map(|f| (f.x - mean.x).powi(2)).sum::<f64>() / n as f64;
        assert_relative_eq!(var_x, nbar / 3.0, max_relative = 0.05);
    }

    #[test]
    fn test_doppler_force_opposes_motion() {
        // Two counter-propagating red-detuned beams push moving atoms back.
        let make = |direction: f64, seed| {
            RadiationPressure::with_seed(
                1.0,
                Vec3::new(0.0, 0.0, direction),
                UniformIntensity { s: 0.1 },
                DopplerDetuning {
                    delta0: -0.5,
                    k: Vec3::new(0.0, 0.0, direction),
                },
                seed,
            )
            .unwrap()
        };
        let a = make(1.0, 1);
        let b = make(-1.0, 2);
        let mut ensemble = Ensemble::new(1);
        ensemble.velocities_mut()[0] = Vec3::new(0.0, 0.0, 0.3);

        let toward_a = a.scattered_photons(1.0, &ensemble).unwrap()[0];
        let toward_b = b.scattered_photons(1.0, &ensemble).unwrap()[0];
        // The atom moves against beam b, which it therefore scatters more.
        assert!(toward_b > toward_a);
    }

    #[test]
    fn test_negative_intensity_is_an_anomaly() {
        let mut force = beam(-0.25, 0.0, 0);
        let ensemble = Ensemble::new(2);
        let mut impulses = vec![Vec3::ZERO; 2];

        let err = force.force(1.0, &ensemble, &mut impulses).unwrap_err();

        assert!(matches!(err, Error::NumericalAnomaly(_)));
        assert!(impulses.iter().all(|f| *f == Vec3::ZERO));
    }

    #[test]
    fn test_degenerate_denominator_is_an_anomaly() {
        // (gamma/2)^2 (1 + 2 s) + delta^2 = 0 for s = -1/2 on resonance.
        let force = beam(-0.5, 0.0, 0);
        let err = force.scattered_photons(1.0, &Ensemble::new(1)).unwrap_err();
        assert!(matches!(err, Error::NumericalAnomaly(_)));
    }

    #[test]
    fn test_profile_length_is_checked() {
        let short = |_: &[Vec3]| vec![1.0];
        struct Short<F>(F);
        impl<F: Fn(&[Vec3]) -> Vec<f64>> IntensityProfile for Short<F> {
            fn intensities(&self, positions: &[Vec3]) -> Vec<f64> {
                (self.0)(positions)
            }
        }
        let force = RadiationPressure::with_seed(
            1.0,
            Vec3::new(1.0, 0.0, 0.0),
            Short(short),
            DopplerDetuning {
                delta0: 0.0,
                k: Vec3::ZERO,
            },
            0,
        )
        .unwrap();

        let err = force.scattered_photons(1.0, &Ensemble::new(3)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 3, found: 1, .. }));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let ensemble = Ensemble::new(4);
        let mut first = vec![Vec3::ZERO; 4];
        let mut second = vec![Vec3::ZERO; 4];
        beam(1.0, 0.0, 99).force(1.0, &ensemble, &mut first).unwrap();
        beam(1.0, 0.0, 99).force(1.0, &ensemble, &mut second).unwrap();
        assert_eq!(first, second);
    }
}
