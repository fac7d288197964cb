//! Simulation configuration loader.
//!
//! Describes a cold-atom setup in YAML so beams, sink and source can be
//! changed without recompiling:
//!
//! ```yaml
//! mass: 1.0
//! seed: 7
//! beams:
//!   - gamma: 1.0
//!     hbar_k: { x: 0.0, y: 0.0, z: 0.1 }
//!     intensity: { kind: uniform, s: 0.1 }
//!     detuning: { delta0: -0.5, k: { x: 0.0, y: 0.0, z: 1.0 } }
//! sink:
//!   point: { x: 0.0, y: 0.0, z: -1.0 }
//!   normal: { x: 0.0, y: 0.0, z: 1.0 }
//! source:
//!   rate: 1000.0
//!   position: { x: 0.0, y: 0.0, z: 0.0 }
//!   velocity: { x: 0.0, y: 0.0, z: 0.0 }
//!   velocity_spread: 0.1
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ensemble::Ensemble;
use crate::error::Error;
use crate::forces::RadiationPressure;
use crate::profiles::{DopplerDetuning, Intensity};
use crate::simulation::Simulation;
use crate::sinks::SinkPlane;
use crate::sources::{PointSource, PointSourceParams};
use crate::types::{constants, Vec3};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] Error),
}

/// One laser beam exerting radiation pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamConfig {
    /// Atomic decay rate.
    pub gamma: f64,
    /// Single-photon recoil momentum.
    pub hbar_k: Vec3,
    pub intensity: Intensity,
    pub detuning: DopplerDetuning,
}

/// A complete simulation setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Mass of every particle.
    pub mass: f64,
    #[serde(default)]
    pub beams: Vec<BeamConfig>,
    #[serde(default)]
    pub sink: Option<SinkPlane>,
    #[serde(default)]
    pub source: Option<PointSourceParams>,
    /// Seed for all random number generators. Omit for a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check mass, beam, and sink parameters.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }
        for (i, beam) in self.beams.iter().enumerate() {
            if !(beam.gamma.is_finite() && beam.gamma > 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "beam {i}: decay rate gamma must be positive and finite, got {}",
                    beam.gamma
                )));
            }
            if let Intensity::Gaussian(profile) = &beam.intensity {
                if !profile.is_valid() {
                    return Err(Error::InvalidConfiguration(format!(
                        "beam {i}: gaussian profile needs a non-zero direction and positive waist"
                    )));
                }
            }
        }
        if let Some(sink) = &self.sink {
            sink.validate()?;
        }
        Ok(())
    }

    /// Build a simulation with `num_particles` particles at rest at the
    /// origin.
    pub fn build(&self, num_particles: usize) -> Result<Simulation, ConfigError> {
        self.validate()?;

        let mut ensemble = Ensemble::new(num_particles);
        ensemble.set_ensemble_property(constants::MASS, self.mass);
        let mut sim = Simulation::new(ensemble);

        for (i, beam) in self.beams.iter().enumerate() {
            let force = match self.seed {
                Some(seed) => RadiationPressure::with_seed(
                    beam.gamma,
                    beam.hbar_k,
                    beam.intensity,
                    beam.detuning,
                    seed.wrapping_add(i as u64),
                )?,
                None => {
                    RadiationPressure::new(beam.gamma, beam.hbar_k, beam.intensity, beam.detuning)?
                }
            };
            sim.add_force(Box::new(force));
        }

        if let Some(params) = &self.source {
            let source = match self.seed {
                Some(seed) => {
                    let offset = self.beams.len() as u64;
                    PointSource::with_seed(params.clone(), seed.wrapping_add(offset))?
                }
                None => PointSource::new(params.clone())?,
            };
            sim.add_source(Box::new(source));
        }

        if let Some(sink) = &self.sink {
            sim.set_sink(Some(Box::new(sink.clone())));
        }

        Ok(sim)
    }
}

/// Load and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SimulationConfig, ConfigError> {
    let contents = fs::read_to_string(path.as_ref())?;
    SimulationConfig::from_yaml_str(&contents)
}

// =============================================================================
// Tests
// =============================================================================
