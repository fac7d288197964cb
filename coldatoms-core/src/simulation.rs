//! Step loop tying sources, forces and a sink to one ensemble.

use log::debug;

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::integrator::{drift_kick, Force};
use crate::sinks::Sink;
use crate::sources::{produce_particles, Source};

/// Particle bookkeeping for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSummary {
    pub produced: usize,
    pub absorbed: usize,
}

/// An ensemble together with everything that acts on it.
pub struct Simulation {
    ensemble: Ensemble,
    sources: Vec<Box<dyn Source>>,
    forces: Vec<Box<dyn Force>>,
    sink: Option<Box<dyn Sink>>,
    time: f64,
    produced: usize,
    absorbed: usize,
}

impl Simulation {
    pub fn new(ensemble: Ensemble) -> Self {
        Self {
            ensemble,
            sources: Vec::new(),
            forces: Vec::new(),
            sink: None,
            time: 0.0,
            produced: 0,
            absorbed: 0,
        }
    }

    pub fn add_source(&mut self, source: Box<dyn Source>) {
        self.sources.push(source);
    }

    pub fn add_force(&mut self, force: Box<dyn Force>) {
        self.forces.push(force);
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn Sink>>) {
        self.sink = sink;
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    pub fn ensemble_mut(&mut self) -> &mut Ensemble {
        &mut self.ensemble
    }

    /// Elapsed simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Total particles produced by sources so far.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Total particles absorbed by the sink so far.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Produce new particles, then advance everything by `dt`.
    pub fn step(&mut self, dt: f64) -> Result<StepSummary> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "time step must be positive and finite, got {dt}"
            )));
        }

        let produced = produce_particles(dt, &mut self.ensemble, &mut self.sources)?;
        self.produced += produced;

        let sink = self.sink.as_mut().map(|sink| &mut **sink as &mut dyn Sink);
        let absorbed = drift_kick(dt, &mut self.ensemble, &mut self.forces, sink)?;
        self.absorbed += absorbed;

        self.time += dt;
        Ok(StepSummary { produced, absorbed })
    }

    /// Run `steps` steps of length `dt`.
    pub fn step_n(&mut self, dt: f64, steps: usize) -> Result<StepSummary> {
        let mut total = StepSummary::default();
        for _ in 0..steps {
            let summary = self.step(dt)?;
            total.produced += summary.produced;
            total.absorbed += summary.absorbed;
        }
        debug!(
            "t={:.6}: {} particles, {} produced, {} absorbed",
            self.time,
            self.ensemble.num_particles(),
            total.produced,
            total.absorbed
        );
        Ok(total)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::SinkPlane;
    use crate::sources::{PointSource, PointSourceParams};
    use crate::types::Vec3;

    fn beam_of_atoms() -> Simulation {
        let mut sim = Simulation::new(Ensemble::new(0));
        let params = PointSourceParams {
            rate: 100.0,
            position: Vec3::ZERO,
            velocity: Vec3::new(0.0, 0.0, 1.0),
            velocity_spread: 0.0,
        };
        sim.add_source(Box::new(PointSource::with_seed(params, 5).unwrap()));
        let wall = SinkPlane::new(Vec3::new(0.0, 0.0, 0.505), Vec3::new(0.0, 0.0, -1.0)).unwrap();
        sim.set_sink(Some(Box::new(wall)));
        sim
    }

    #[test]
    fn test_particles_are_conserved() {
        let mut sim = beam_of_atoms();
        let summary = sim.step_n(0.01, 200).unwrap();

        assert!(summary.produced > 0);
        assert!(summary.absorbed > 0);
        assert_eq!(sim.produced(), summary.produced);
        assert_eq!(sim.absorbed(), summary.absorbed);
        assert_eq!(sim.ensemble().num_particles(), sim.produced() - sim.absorbed());
        // Nothing survives past the wall.
        assert!(sim.ensemble().positions().iter().all(|x| x.z < 0.505));
        assert!((sim.time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_step_rejects_bad_dt() {
        let mut sim = beam_of_atoms();
        for dt in [0.0, -0.1, f64::NAN] {
            assert!(matches!(sim.step(dt), Err(Error::InvalidConfiguration(_))));
        }
        assert_eq!(sim.time(), 0.0);
    }
}
