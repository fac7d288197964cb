//! Python bindings for coldatoms-core.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from coldatoms import Simulation
//!
//! sim = Simulation.from_file("molasses.yaml", 1000)
//! sim.set_velocities([(0.0, 0.0, 0.5)] * 1000)
//!
//! for _ in range(100):
//!     sim.step(0.1)
//!     print(sim.num_particles(), sim.time)
//!
//! v = sim.velocities()[0]
//! print(v.z, v.magnitude())
//! ```

use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use coldatoms_core::config::{load_config, ConfigError, SimulationConfig};
use coldatoms_core::types::constants;
use coldatoms_core::{
    Ensemble as CoreEnsemble, Error as CoreError, Simulation as CoreSimulation, Vec3 as CoreVec3,
};

type Triple = (f64, f64, f64);

fn core_err(err: CoreError) -> PyErr {
    match err {
        CoreError::NumericalAnomaly(_) | CoreError::MissingMass => {
            PyRuntimeError::new_err(err.to_string())
        }
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn config_err(err: ConfigError) -> PyErr {
    match err {
        ConfigError::Io(e) => e.into(),
        ConfigError::Parse(_) => PyValueError::new_err(err.to_string()),
        ConfigError::Invalid(e) => core_err(e),
    }
}

fn to_vectors(values: &[CoreVec3]) -> Vec<Vec3> {
    values.iter().copied().map(Vec3::from).collect()
}

fn write_triples(target: &mut [CoreVec3], values: Vec<Triple>, what: &str) -> PyResult<()> {
    if values.len() != target.len() {
        return Err(PyValueError::new_err(format!(
            "expected {} {what}, got {}",
            target.len(),
            values.len()
        )));
    }
    for (slot, (x, y, z)) in target.iter_mut().zip(values) {
        *slot = CoreVec3::new(x, y, z);
    }
    Ok(())
}

/// 3D vector for positions, velocities, etc.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> Triple {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

/// A standalone particle ensemble.
#[pyclass]
#[derive(Clone)]
pub struct Ensemble {
    inner: CoreEnsemble,
}

#[pymethods]
impl Ensemble {
    #[new]
    #[pyo3(signature = (num_particles = 1))]
    fn new(num_particles: usize) -> Self {
        Self {
            inner: CoreEnsemble::new(num_particles),
        }
    }

    #[getter]
    fn num_particles(&self) -> usize {
        self.inner.num_particles()
    }

    fn __len__(&self) -> usize {
        self.inner.num_particles()
    }

    /// Particle positions as Vec3.
    fn positions(&self) -> Vec<Vec3> {
        to_vectors(self.inner.positions())
    }

    /// Particle velocities as Vec3.
    fn velocities(&self) -> Vec<Vec3> {
        to_vectors(self.inner.velocities())
    }

    fn set_positions(&mut self, positions: Vec<Triple>) -> PyResult<()> {
        write_triples(self.inner.positions_mut(), positions, "positions")
    }

    fn set_velocities(&mut self, velocities: Vec<Triple>) -> PyResult<()> {
        write_triples(self.inner.velocities_mut(), velocities, "velocities")
    }

    /// Set one mass shared by all particles.
    fn set_mass(&mut self, mass: f64) {
        self.inner.set_ensemble_property(constants::MASS, mass);
    }

    /// Set one value per particle under `key`.
    fn set_particle_property(&mut self, key: &str, values: Vec<f64>) -> PyResult<()> {
        self.inner
            .set_particle_scalars(key, &values)
            .map_err(core_err)
    }

    fn particle_property(&self, key: &str) -> PyResult<Vec<f64>> {
        self.inner
            .particle_property(key)
            .map(|p| p.as_slice().to_vec())
            .ok_or_else(|| PyIndexError::new_err(format!("no particle property {key:?}")))
    }

    fn resize(&mut self, new_size: usize) {
        self.inner.resize(new_size);
    }

    fn delete(&mut self, indices: Vec<usize>) {
        self.inner.delete(&indices);
    }

    fn __repr__(&self) -> String {
        format!("Ensemble(num_particles={})", self.inner.num_particles())
    }
}

/// Main simulation class.
///
/// Built from a YAML configuration; handles particle production, radiation
/// pressure and the sink.
#[pyclass(unsendable)]
pub struct Simulation {
    inner: CoreSimulation,
}

#[pymethods]
impl Simulation {
    /// Create a simulation from a YAML configuration string.
    #[staticmethod]
    #[pyo3(signature = (yaml, num_particles = 0))]
    fn from_yaml(yaml: &str, num_particles: usize) -> PyResult<Self> {
        let config = SimulationConfig::from_yaml_str(yaml).map_err(config_err)?;
        let inner = config.build(num_particles).map_err(config_err)?;
        Ok(Self { inner })
    }

    /// Create a simulation from a YAML configuration file.
    #[staticmethod]
    #[pyo3(signature = (path, num_particles = 0))]
    fn from_file(path: &str, num_particles: usize) -> PyResult<Self> {
        let config = load_config(path).map_err(config_err)?;
        let inner = config.build(num_particles).map_err(config_err)?;
        Ok(Self { inner })
    }

    /// Current simulation time.
    #[getter]
    fn time(&self) -> f64 {
        self.inner.time()
    }

    fn num_particles(&self) -> usize {
        self.inner.ensemble().num_particles()
    }

    /// Particle positions as Vec3.
    fn positions(&self) -> Vec<Vec3> {
        to_vectors(self.inner.ensemble().positions())
    }

    /// Particle velocities as Vec3.
    fn velocities(&self) -> Vec<Vec3> {
        to_vectors(self.inner.ensemble().velocities())
    }

    /// Position of particle `index` as Vec3.
    fn position(&self, index: usize) -> PyResult<Vec3> {
        self.inner
            .ensemble()
            .positions()
            .get(index)
            .copied()
            .map(Vec3::from)
            .ok_or_else(|| PyIndexError::new_err(format!("no particle {index}")))
    }

    fn set_positions(&mut self, positions: Vec<Triple>) -> PyResult<()> {
        write_triples(self.inner.ensemble_mut().positions_mut(), positions, "positions")
    }

    fn set_velocities(&mut self, velocities: Vec<Triple>) -> PyResult<()> {
        write_triples(self.inner.ensemble_mut().velocities_mut(), velocities, "velocities")
    }

    /// Copy of the current ensemble.
    fn ensemble(&self) -> Ensemble {
        Ensemble {
            inner: self.inner.ensemble().clone(),
        }
    }

    /// Advance simulation by dt.
    ///
    /// Returns the number of particles produced and absorbed during the step.
    fn step(&mut self, dt: f64) -> PyResult<(usize, usize)> {
        let summary = self.inner.step(dt).map_err(core_err)?;
        Ok((summary.produced, summary.absorbed))
    }

    /// Run multiple steps at once (more efficient).
    fn step_n(&mut self, dt: f64, steps: usize) -> PyResult<(usize, usize)> {
        let summary = self.inner.step_n(dt, steps).map_err(core_err)?;
        Ok((summary.produced, summary.absorbed))
    }

    /// Get current state as dict for easy inspection.
    fn state_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let ensemble = self.inner.ensemble();
        let n = ensemble.num_particles().max(1) as f64;
        let mean_velocity = ensemble.velocities().iter().copied().sum::<CoreVec3>() / n;
        let dict = PyDict::new(py);
        dict.set_item("time", self.inner.time())?;
        dict.set_item("num_particles", ensemble.num_particles())?;
        dict.set_item("produced", self.inner.produced())?;
        dict.set_item("absorbed", self.inner.absorbed())?;
        dict.set_item("mean_vx", mean_velocity.x)?;
        dict.set_item("mean_vy", mean_velocity.y)?;
        dict.set_item("mean_vz", mean_velocity.z)?;
        Ok(dict)
    }
}

/// Python module definition.
#[pymodule]
fn coldatoms(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<Ensemble>()?;
    m.add_class::<Simulation>()?;
    Ok(())
}
