//! # Coldatoms Core
//!
//! Particle ensembles driven by laser light, fed by sources and drained by
//! absorbing sinks.
//!
//! ## Architecture
//!
//! - `types`: `Vec3` and shared constants
//! - `error`: Error taxonomy for the integration core
//! - `ensemble`: Structure-of-arrays particle storage with resize and delete
//! - `sources`: Particle production protocol and a Poisson point source
//! - `sinks`: Absorbing surfaces and per-step sink processing
//! - `integrator`: `Force` trait and the drift-kick-drift step
//! - `forces`: Radiation pressure with recoil momentum diffusion
//! - `profiles`: Laser intensity and detuning profiles
//! - `config`: YAML-based simulation configuration loader
//! - `simulation`: Main orchestrator

pub mod config;
pub mod ensemble;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod profiles;
pub mod simulation;
pub mod sinks;
pub mod sources;
pub mod types;

pub use ensemble::{Ensemble, EnsembleProperty, Mass, ParticleProperty};
pub use error::{Error, Result};
pub use forces::RadiationPressure;
pub use integrator::{drift_kick, Force};
pub use simulation::{Simulation, StepSummary};
pub use sinks::{process_sink, Sink, SinkPlane};
pub use sources::{produce_particles, Source};
pub use types::Vec3;
