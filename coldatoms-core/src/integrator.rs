//! Drift-kick-drift integration of the ensemble.
//!
//! The integrator is a symmetric (Strang) splitting of free flight and
//! velocity kicks. It is second-order accurate, symplectic and
//! time-reversible for forces that depend only on position.
//!
//! ## Algorithm
//!
//! With forces acting, one step of length dt is:
//!
//! ```text
//! 1. sink(dt/2)
//! 2. x += v * dt/2                       drift
//! 3. f = sum of forces integrated over dt, evaluated at the midpoint
//! 4. v += f / m                          kick
//! 5. sink(dt/2)
//! 6. x += v * dt/2                       drift
//! ```
//!
//! Splitting the sink test into two halves keeps absorption consistent with
//! the midpoint at which forces are evaluated. Without forces the step is
//! a single sink test followed by a full drift.

use log::trace;

use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::sinks::{process_sink, reborrow, Sink};
use crate::types::Vec3;

/// A force acting independently on each particle of an ensemble.
pub trait Force {
    /// Add the impulse of this force, integrated over `dt`, to `impulses`.
    ///
    /// `impulses` has one entry per particle and already holds the
    /// contributions of other forces; implementations must add, never
    /// overwrite.
    fn force(&mut self, dt: f64, ensemble: &Ensemble, impulses: &mut [Vec3]) -> Result<()>;
}

/// Advance `ensemble` by `dt` with the drift-kick-drift scheme.
///
/// Particles absorbed by `sink` are removed along the way; the number of
/// absorbed particles is returned. A force-driven step needs a `mass`
/// ensemble or particle property, which is checked before the ensemble is
/// touched.
pub fn drift_kick(
    dt: f64,
    ensemble: &mut Ensemble,
    forces: &mut [Box<dyn Force>],
    mut sink: Option<&mut dyn Sink>,
) -> Result<usize> {
    if forces.is_empty() {
        let absorbed = process_sink(dt, ensemble, sink)?;
        ensemble.drift(dt);
        return Ok(absorbed);
    }

    ensemble.mass()?;

    let half_dt = 0.5 * dt;
    let mut absorbed = process_sink(half_dt, ensemble, reborrow(&mut sink))?;
    ensemble.drift(half_dt);
    trace!("first drift done, {} particles", ensemble.num_particles());

    let mut impulses = vec![Vec3::ZERO; ensemble.num_particles()];
    for force in forces.iter_mut() {
        force.force(dt, ensemble, &mut impulses)?;
    }
    ensemble.kick(&impulses)?;
    trace!("kick applied");

    absorbed += process_sink(half_dt, ensemble, sink)?;
    ensemble.drift(half_dt);
    Ok(absorbed)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sinks::SinkPlane;
    use crate::sources::{produce_particles, Source};
    use crate::types::constants;
    use std::ops::Range;
    use approx::assert_relative_eq;

    /// Constant force, adding `f * dt` each step.
    struct Constant(Vec3);

    impl Force for Constant {
        fn force(&mut self, dt: f64, ensemble: &Ensemble, impulses: &mut [Vec3]) -> Result<()> {
            assert_eq!(impulses.len(), ensemble.num_particles());
            for f in impulses.iter_mut() {
                *f += self.0 * dt;
            }
            Ok(())
        }
    }

    /// Harmonic restoring force `-k x`, evaluated at the drift midpoint.
    struct Spring(f64);

    impl Force for Spring {
        fn force(&mut self, dt: f64, ensemble: &Ensemble, impulses: &mut [Vec3]) -> Result<()> {
            for (f, x) in impulses.iter_mut().zip(ensemble.positions()) {
                *f += *x * (-self.0 * dt);
            }
            Ok(())
        }
    }

    fn moving_ensemble() -> Ensemble {
        Ensemble::from_state(
            vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 4.0)],
            vec![Vec3::new(0.5, -1.0, 2.0), Vec3::new(0.0, 3.0, -1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_free_flight() {
        let mut ensemble = moving_ensemble();
        let before = ensemble.clone();

        let absorbed = drift_kick(0.25, &mut ensemble, &mut [], None).unwrap();

        assert_eq!(absorbed, 0);
        for i in 0..2 {
            let expected = before.positions()[i] + before.velocities()[i] * 0.25;
            assert_relative_eq!(ensemble.positions()[i].x, expected.x);
            assert_relative_eq!(ensemble.positions()[i].y, expected.y);
            assert_relative_eq!(ensemble.positions()[i].z, expected.z);
            assert_eq!(ensemble.velocities()[i], before.velocities()[i]);
        }
    }

    #[test]
    fn test_free_flight_needs_no_mass() {
        let mut ensemble = moving_ensemble();
        assert!(drift_kick(1.0, &mut ensemble, &mut [], None).is_ok());
    }

    #[test]
    fn test_constant_force_matches_exact_solution() {
        let accel = Vec3::new(0.0, -9.81, 1.0);
        let mass = 2.0;
        let mut ensemble = moving_ensemble();
        ensemble.set_ensemble_property(constants::MASS, mass);
        let x0 = ensemble.positions()[0];
        let v0 = ensemble.velocities()[0];

        let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Constant(accel * mass))];
        let dt = 0.01;
        let steps = 100;
        for _ in 0..steps {
            drift_kick(dt, &mut ensemble, &mut forces, None).unwrap();
        }

        // Drift-kick-drift is exact for constant forces.
        let t = dt * steps as f64;
        let x = x0 + v0 * t + accel * (0.5 * t * t);
        let v = v0 + accel * t;
        assert_relative_eq!(ensemble.positions()[0].y, x.y, max_relative = 1e-10);
        assert_relative_eq!(ensemble.positions()[0].z, x.z, max_relative = 1e-10);
        assert_relative_eq!(ensemble.velocities()[0].y, v.y, max_relative = 1e-10);
        assert_relative_eq!(ensemble.velocities()[0].z, v.z, max_relative = 1e-10);
    }

    #[test]
    fn test_single_kick_applies_impulse_over_mass() {
        let mut ensemble = Ensemble::new(2);
        ensemble.set_particle_scalars(constants::MASS, &[1.0, 4.0]).unwrap();
        let mut forces: Vec<Box<dyn Force>> = vec![
            Box::new(Constant(Vec3::new(4.0, 0.0, 0.0))),
            Box::new(Constant(Vec3::new(0.0, 8.0, 0.0))),
        ];

        drift_kick(0.5, &mut ensemble, &mut forces, None).unwrap();

        assert_eq!(ensemble.velocities()[0], Vec3::new(2.0, 4.0, 0.0));
        assert_eq!(ensemble.velocities()[1], Vec3::new(0.5, 1.0, 0.0));
        // Only the second half-drift sees the new velocity.
        assert_eq!(ensemble.positions()[0], Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_harmonic_oscillator_is_second_order() {
        let run = |dt: f64| {
            let mut ensemble = Ensemble::from_state(vec![Vec3::new(1.0, 0.0, 0.0)], vec![Vec3::ZERO]).unwrap();
            ensemble.set_ensemble_property(constants::MASS, 1.0);
            let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Spring(1.0))];
            let steps = (1.0 / dt).round() as usize;
            for _ in 0..steps {
                drift_kick(dt, &mut ensemble, &mut forces, None).unwrap();
            }
            (ensemble.positions()[0].x - 1.0f64.cos()).abs()
        };

        let coarse = run(0.01);
        let fine = run(0.005);
        let ratio = coarse / fine;
        assert!((3.5..4.5).contains(&ratio), "error ratio {ratio}");
    }

    #[test]
    fn test_missing_mass_leaves_ensemble_untouched() {
        let mut ensemble = moving_ensemble();
        let before = ensemble.clone();
        let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Constant(Vec3::splat(1.0)))];
        let mut sink = SinkPlane::new(Vec3::new(0.0, 0.0, 3.5), Vec3::new(0.0, 0.0, 1.0)).unwrap();

        let err = drift_kick(1.0, &mut ensemble, &mut forces, Some(&mut sink)).unwrap_err();

        assert_eq!(err, Error::MissingMass);
        assert_eq!(ensemble, before);
    }

    /// Emits one particle at rest without setting its mass.
    struct Massless;

    impl Source for Massless {
        fn num_particles_produced(&mut self, _dt: f64) -> usize {
            1
        }

        fn produce_particles(
            &mut self,
            _dt: f64,
            _range: Range<usize>,
            _ensemble: &mut Ensemble,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unfilled_particle_mass_is_reported() {
        let mut ensemble = Ensemble::new(1);
        ensemble.set_particle_scalars(constants::MASS, &[1.0]).unwrap();
        let mut sources: Vec<Box<dyn Source>> = vec![Box::new(Massless)];
        produce_particles(0.1, &mut ensemble, &mut sources).unwrap();
        let before = ensemble.clone();
        let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Constant(Vec3::new(0.0, 0.0, 1.0)))];

        let err = drift_kick(0.1, &mut ensemble, &mut forces, None).unwrap_err();

        assert!(matches!(err, Error::NumericalAnomaly(_)));
        assert_eq!(ensemble, before);
    }

    #[test]
    fn test_zero_ensemble_mass_is_rejected() {
        let mut ensemble = moving_ensemble();
        ensemble.set_ensemble_property(constants::MASS, 0.0);
        let before = ensemble.clone();
        let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Constant(Vec3::new(0.0, 0.0, 1.0)))];

        let err = drift_kick(0.1, &mut ensemble, &mut forces, None).unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(ensemble, before);
        assert!(ensemble.velocities().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_sink_during_free_flight() {
        let mut ensemble = Ensemble::from_state(
            vec![Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 5.0)],
            vec![Vec3::new(0.0, 0.0, -10.0), Vec3::new(1.0, 0.0, 0.0)],
        )
        .unwrap();
        let mut sink = SinkPlane::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)).unwrap();

        let absorbed = drift_kick(1.0, &mut ensemble, &mut [], Some(&mut sink)).unwrap();

        assert_eq!(absorbed, 1);
        assert_eq!(ensemble.num_particles(), 1);
        assert_eq!(ensemble.positions()[0], Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn test_sink_in_second_half_step() {
        // The kick turns the particle around towards the plane, so only the
        // second half-step sees it crossing.
        let mut ensemble = Ensemble::from_state(vec![Vec3::new(0.0, 0.0, 1.0)], vec![Vec3::new(0.0, 0.0, 1.0)]).unwrap();
        ensemble.set_ensemble_property(constants::MASS, 1.0);
        let mut forces: Vec<Box<dyn Force>> = vec![Box::new(Constant(Vec3::new(0.0, 0.0, -10.0)))];
        let mut sink = SinkPlane::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)).unwrap();

        let absorbed = drift_kick(1.0, &mut ensemble, &mut forces, Some(&mut sink)).unwrap();

        assert_eq!(absorbed, 1);
        assert!(ensemble.is_empty());
    }
}
