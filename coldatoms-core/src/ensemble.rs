//! The particle ensemble.
//!
//! Particle state is stored as a structure of arrays: positions and
//! velocities are contiguous `Vec<Vec3>` buffers, and every named
//! per-particle property is a row-major `f64` buffer whose leading dimension
//! is the particle count.
//!
//! ```text
//! index       0     1     2   ...   N-1
//! positions   x0    x1    x2        xN-1
//! velocities  v0    v1    v2        vN-1
//! "mass"      m0    m1    m2        mN-1     (width 1)
//! "dipole"   d0..  d1..  d2..      dN-1..    (width w)
//! ```
//!
//! `resize` and `delete` always act on every buffer at once, so the leading
//! dimensions stay equal no matter where a step fails.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{constants, Vec3};

/// A value shared by every particle of an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnsembleProperty {
    Scalar(f64),
    Vector(Vec3),
    Array(Vec<f64>),
}

impl From<f64> for EnsembleProperty {
    fn from(value: f64) -> Self {
        EnsembleProperty::Scalar(value)
    }
}

impl From<Vec3> for EnsembleProperty {
    fn from(value: Vec3) -> Self {
        EnsembleProperty::Vector(value)
    }
}

impl From<Vec<f64>> for EnsembleProperty {
    fn from(value: Vec<f64>) -> Self {
        EnsembleProperty::Array(value)
    }
}

/// A per-particle property: `num_rows()` rows of `width()` values each.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleProperty {
    values: Vec<f64>,
    width: usize,
}

impl ParticleProperty {
    /// One value per particle.
    pub fn scalars(values: Vec<f64>) -> Self {
        Self { values, width: 1 }
    }

    /// One 3-vector per particle, stored as three consecutive values.
    pub fn vectors(values: &[Vec3]) -> Self {
        Self {
            values: values.iter().flat_map(|v| v.to_array()).collect(),
            width: 3,
        }
    }

    /// Row-major values with `width` entries per particle.
    pub fn with_width(values: Vec<f64>, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidConfiguration(
                "particle property width must be at least 1".to_string(),
            ));
        }
        if values.len() % width != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "{} values do not split into rows of width {}",
                values.len(),
                width
            )));
        }
        Ok(Self { values, width })
    }

    pub fn num_rows(&self) -> usize {
        self.values.len() / self.width
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Mutable view of the values. The row count cannot change through it.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index * self.width..(index + 1) * self.width]
    }

    pub fn row_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.values[index * self.width..(index + 1) * self.width]
    }

    fn resize_rows(&mut self, rows: usize) {
        self.values.resize(rows * self.width, 0.0);
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        let width = self.width;
        let mut write = 0;
        for (row, _) in keep.iter().enumerate().filter(|(_, k)| **k) {
            if row != write {
                self.values
                    .copy_within(row * width..(row + 1) * width, write * width);
            }
            write += 1;
        }
        self.values.truncate(write * width);
    }
}

/// Particle masses as resolved for an acceleration update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mass<'a> {
    /// Ensemble-wide mass, broadcast over all particles.
    Uniform(f64),
    PerParticle(&'a [f64]),
}

impl Mass<'_> {
    /// Mass of particle `index`.
    pub fn of(&self, index: usize) -> f64 {
        match self {
            Mass::Uniform(m) => *m,
            Mass::PerParticle(masses) => masses[index],
        }
    }
}

/// An ensemble of particles.
///
/// Every ensemble has particle positions and velocities. In addition it may
/// carry ensemble-wide properties and per-particle properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    ensemble_properties: HashMap<String, EnsembleProperty>,
    particle_properties: HashMap<String, ParticleProperty>,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Ensemble {
    /// Create `num_particles` particles at rest at the origin.
    pub fn new(num_particles: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; num_particles],
            velocities: vec![Vec3::ZERO; num_particles],
            ensemble_properties: HashMap::new(),
            particle_properties: HashMap::new(),
        }
    }

    /// Create an ensemble from explicit positions and velocities.
    pub fn from_state(positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Result<Self> {
        if positions.len() != velocities.len() {
            return Err(Error::shape("velocities", positions.len(), velocities.len()));
        }
        Ok(Self {
            positions,
            velocities,
            ensemble_properties: HashMap::new(),
            particle_properties: HashMap::new(),
        })
    }

    pub fn num_particles(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    pub fn ensemble_property(&self, key: &str) -> Option<&EnsembleProperty> {
        self.ensemble_properties.get(key)
    }

    pub fn set_ensemble_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<EnsembleProperty>,
    ) {
        self.ensemble_properties.insert(key.into(), value.into());
    }

    pub fn remove_ensemble_property(&mut self, key: &str) -> Option<EnsembleProperty> {
        self.ensemble_properties.remove(key)
    }

    pub fn particle_property(&self, key: &str) -> Option<&ParticleProperty> {
        self.particle_properties.get(key)
    }

    pub fn particle_property_mut(&mut self, key: &str) -> Option<&mut ParticleProperty> {
        self.particle_properties.get_mut(key)
    }

    pub fn particle_property_keys(&self) -> impl Iterator<Item = &str> {
        self.particle_properties.keys().map(String::as_str)
    }

    /// Store a per-particle property.
    ///
    /// The property must have exactly one row per particle currently in the
    /// ensemble; the ensemble keeps its own copy.
    pub fn set_particle_property(
        &mut self,
        key: impl Into<String>,
        property: &ParticleProperty,
    ) -> Result<()> {
        let key = key.into();
        if property.num_rows() != self.num_particles() {
            return Err(Error::shape(key, self.num_particles(), property.num_rows()));
        }
        self.particle_properties.insert(key, property.clone());
        Ok(())
    }

    /// Store a width-1 per-particle property.
    pub fn set_particle_scalars(&mut self, key: impl Into<String>, values: &[f64]) -> Result<()> {
        self.set_particle_property(key, &ParticleProperty::scalars(values.to_vec()))
    }

    pub fn remove_particle_property(&mut self, key: &str) -> Option<ParticleProperty> {
        self.particle_properties.remove(key)
    }

    /// Change the number of particles to `new_size`.
    ///
    /// Rows below `min(num_particles, new_size)` are preserved in every
    /// buffer. Rows added by growing the ensemble are zero-filled: particles
    /// at the origin, at rest, with all per-particle properties zero.
    pub fn resize(&mut self, new_size: usize) {
        self.positions.resize(new_size, Vec3::ZERO);
        self.velocities.resize(new_size, Vec3::ZERO);
        for property in self.particle_properties.values_mut() {
            property.resize_rows(new_size);
        }
    }

    /// Remove the particles at `indices`.
    ///
    /// The surviving particles keep their relative order, and the same rows
    /// are removed from positions, velocities and every per-particle
    /// property. Duplicate indices are harmless; out-of-range indices are
    /// ignored.
    pub fn delete(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let n = self.num_particles();
        let mut keep = vec![true; n];
        for &index in indices {
            match keep.get_mut(index) {
                Some(slot) => *slot = false,
                None => warn!("ignoring deletion of particle {index} from ensemble of {n}"),
            }
        }

        retain_by_mask(&mut self.positions, &keep);
        retain_by_mask(&mut self.velocities, &keep);
        for property in self.particle_properties.values_mut() {
            property.retain_rows(&keep);
        }
    }

    /// Advance positions along straight lines: `x += dt * v`.
    pub fn drift(&mut self, dt: f64) {
        for (x, v) in self.positions.iter_mut().zip(&self.velocities) {
            *x += *v * dt;
        }
    }

    /// Resolve the particle masses.
    ///
    /// An ensemble-wide `mass` takes precedence over a per-particle one and
    /// must be a positive finite scalar. Ensemble-wide arrays are rejected:
    /// they are not resized or compacted with the particles, so a per-particle
    /// mass belongs in a width-1 particle property. Every per-particle mass
    /// must be positive and finite; particles added by `resize` get mass zero
    /// until a source or the caller fills it in.
    pub fn mass(&self) -> Result<Mass<'_>> {
        resolve_mass(&self.ensemble_properties, &self.particle_properties)
    }

    /// Apply the impulses `f` to the velocities: `v += f / m`.
    pub fn kick(&mut self, impulses: &[Vec3]) -> Result<()> {
        if impulses.len() != self.num_particles() {
            return Err(Error::shape("impulses", self.num_particles(), impulses.len()));
        }
        let mass = resolve_mass(&self.ensemble_properties, &self.particle_properties)?;
        for (i, (v, f)) in self.velocities.iter_mut().zip(impulses).enumerate() {
            *v += *f / mass.of(i);
        }
        Ok(())
    }
}

fn is_valid_mass(m: f64) -> bool {
    m.is_finite() && m > 0.0
}

fn resolve_mass<'a>(
    ensemble_properties: &'a HashMap<String, EnsembleProperty>,
    particle_properties: &'a HashMap<String, ParticleProperty>,
) -> Result<Mass<'a>> {
    if let Some(property) = ensemble_properties.get(constants::MASS) {
        return match property {
            EnsembleProperty::Scalar(m) if is_valid_mass(*m) => Ok(Mass::Uniform(*m)),
            EnsembleProperty::Scalar(m) => Err(Error::InvalidConfiguration(format!(
                "ensemble mass must be positive and finite, got {m}"
            ))),
            other => Err(Error::InvalidConfiguration(format!(
                "ensemble mass must be a scalar, got {other:?}"
            ))),
        };
    }
    let property = particle_properties
        .get(constants::MASS)
        .ok_or(Error::MissingMass)?;
    if property.width() != 1 {
        return Err(Error::InvalidConfiguration(format!(
            "particle mass must have width 1, got width {}",
            property.width()
        )));
    }
    let masses = property.as_slice();
    if let Some((i, m)) = masses.iter().enumerate().find(|(_, m)| !is_valid_mass(**m)) {
        return Err(Error::NumericalAnomaly(format!(
            "particle {i} has mass {m}, expected a positive finite value"
        )));
    }
    Ok(Mass::PerParticle(masses))
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    values.retain(|_| flags.next().copied().unwrap_or(false));
}

// =============================================================================
// Tests
// =============================================================================
