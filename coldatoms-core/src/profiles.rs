//! Laser intensity and detuning profiles.
//!
//! The radiation pressure force only needs two capabilities: the intensity
//! at each particle and the detuning each particle sees. Anything
//! implementing [`IntensityProfile`] or [`DetuningProfile`] can be plugged
//! in, including plain closures evaluated per particle.

use serde::{Deserialize, Serialize};

use crate::types::{constants, Vec3};

/// Laser intensity, in units of the saturation intensity.
pub trait IntensityProfile {
    /// Intensity at each position; one entry per particle.
    fn intensities(&self, positions: &[Vec3]) -> Vec<f64>;
}

/// Detuning of the atomic transition from the laser.
///
/// Red detuning is negative, blue detuning positive.
pub trait DetuningProfile {
    /// Detuning seen by each particle; one entry per particle.
    fn detunings(&self, positions: &[Vec3], velocities: &[Vec3]) -> Vec<f64>;
}

impl<F> IntensityProfile for F
where
    F: Fn(&Vec3) -> f64,
{
    fn intensities(&self, positions: &[Vec3]) -> Vec<f64> {
        positions.iter().map(self).collect()
    }
}

impl<F> DetuningProfile for F
where
    F: Fn(&Vec3, &Vec3) -> f64,
{
    fn detunings(&self, positions: &[Vec3], velocities: &[Vec3]) -> Vec<f64> {
        positions
            .iter()
            .zip(velocities)
            .map(|(x, v)| self(x, v))
            .collect()
    }
}

/// The same intensity everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformIntensity {
    pub s: f64,
}

impl IntensityProfile for UniformIntensity {
    fn intensities(&self, positions: &[Vec3]) -> Vec<f64> {
        vec![self.s; positions.len()]
    }
}

/// A collimated Gaussian beam (no focusing).
///
/// `s(x) = s0 * exp(-2 r^2 / waist^2)` where `r` is the distance of `x`
/// from the beam axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBeam {
    /// A point on the beam axis.
    pub center: Vec3,
    /// Propagation direction; normalized on use.
    pub direction: Vec3,
    /// Peak intensity on axis.
    pub s0: f64,
    /// 1/e^2 intensity radius.
    pub waist: f64,
}

impl IntensityProfile for GaussianBeam {
    fn intensities(&self, positions: &[Vec3]) -> Vec<f64> {
        let axis = self.direction.normalized();
        let w2 = self.waist * self.waist;
        positions
            .iter()
            .map(|x| {
                let d = *x - self.center;
                let along = d.dot(&axis);
                let r2 = (d.magnitude_squared() - along * along).max(0.0);
                self.s0 * (-2.0 * r2 / w2).exp()
            })
            .collect()
    }
}

/// Intensity profiles that can be named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intensity {
    Uniform(UniformIntensity),
    Gaussian(GaussianBeam),
}

impl IntensityProfile for Intensity {
    fn intensities(&self, positions: &[Vec3]) -> Vec<f64> {
        match self {
            Intensity::Uniform(profile) => profile.intensities(positions),
            Intensity::Gaussian(profile) => profile.intensities(positions),
        }
    }
}

/// Laser detuning shifted by the Doppler effect: `delta0 - k . v`.
///
/// An atom moving against the beam (`k . v < 0`) sees the laser shifted
/// towards the blue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerDetuning {
    /// Detuning of an atom at rest.
    pub delta0: f64,
    /// Laser wave vector.
    pub k: Vec3,
}

impl DetuningProfile for DopplerDetuning {
    fn detunings(&self, _positions: &[Vec3], velocities: &[Vec3]) -> Vec<f64> {
        velocities.iter().map(|v| self.delta0 - self.k.dot(v)).collect()
    }
}

impl GaussianBeam {
    /// True if the beam has a usable axis and waist.
    pub fn is_valid(&self) -> bool {
        self.direction.magnitude_squared() > constants::EPSILON && self.waist > 0.0
    }
}

// =============================================================================
// Tests
// =============================================================================
