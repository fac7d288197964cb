//! Particle sinks.
//!
//! A sink is an absorbing surface. Each step we look for particles whose
//! straight-line trajectory crosses the surface during the interval and
//! remove them from the ensemble.
//!
//! ```text
//! Time t=0           Time t=dt
//!    ●───────────────────●
//!          \
//!           \   tau in [0, dt]
//! ═══════════╳══════════════  sink
//!            └─ absorbed
//! ```
//!
//! The one-step linear test catches fast particles regardless of step size,
//! but it does not follow curved trajectories within a step.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::types::{constants, Vec3};

/// An absorbing surface that removes particles hitting it.
pub trait Sink {
    /// Time after which each particle, moving in a straight line from `x`
    /// with velocity `v`, hits the sink.
    ///
    /// Particles that do not hit the sink within `dt` must get a time
    /// greater than `dt`. The result has one entry per particle.
    fn find_absorption_time(&self, positions: &[Vec3], velocities: &[Vec3], dt: f64) -> Vec<f64>;

    /// Called with the particles about to be absorbed, before they are
    /// removed from the ensemble.
    fn record_absorption(
        &mut self,
        _ensemble: &Ensemble,
        _dt: f64,
        _absorption_times: &[f64],
        _absorption_indices: &[usize],
    ) {
    }
}

/// A sink absorbing every particle that crosses a plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkPlane {
    /// A point in the plane.
    pub point: Vec3,
    /// A normal to the plane; it need not be normalized.
    pub normal: Vec3,
}

impl SinkPlane {
    pub fn new(point: Vec3, normal: Vec3) -> Result<Self> {
        let plane = Self { point, normal };
        plane.validate()?;
        Ok(plane)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.point.is_finite() || !self.normal.is_finite() {
            return Err(Error::InvalidConfiguration(
                "sink plane must have finite point and normal".to_string(),
            ));
        }
        if self.normal.magnitude_squared() < constants::EPSILON {
            return Err(Error::InvalidConfiguration(
                "sink plane normal must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Sink for SinkPlane {
    fn find_absorption_time(&self, positions: &[Vec3], velocities: &[Vec3], dt: f64) -> Vec<f64> {
        positions
            .iter()
            .zip(velocities)
            .map(|(x, v)| {
                let normal_velocity = self.normal.dot(v);
                if normal_velocity == 0.0 {
                    // Parallel to the plane: never absorbed in this interval.
                    2.0 * dt
                } else {
                    self.normal.dot(&(self.point - *x)) / normal_velocity
                }
            })
            .collect()
    }
}

/// True if `tau` lies in the closed interval `[0, dt]`.
pub fn absorbed_within(tau: f64, dt: f64) -> bool {
    (tau - 0.5 * dt).abs() <= 0.5 * dt
}

/// Remove the particles absorbed by `sink` during an interval `dt`.
///
/// Returns the number of absorbed particles. Without a sink this does
/// nothing.
pub fn process_sink(
    dt: f64,
    ensemble: &mut Ensemble,
    sink: Option<&mut dyn Sink>,
) -> Result<usize> {
    let Some(sink) = sink else {
        return Ok(0);
    };

    let n = ensemble.num_particles();
    let absorption_times =
        sink.find_absorption_time(ensemble.positions(), ensemble.velocities(), dt);
    if absorption_times.len() != n {
        return Err(Error::shape("absorption times", n, absorption_times.len()));
    }

    let nan_count = absorption_times.iter().filter(|tau| tau.is_nan()).count();
    if nan_count > 0 {
        warn!("sink returned {nan_count} NaN absorption times; those particles are kept");
    }

    let absorption_indices: Vec<usize> = absorption_times
        .iter()
        .enumerate()
        .filter(|(_, tau)| absorbed_within(**tau, dt))
        .map(|(i, _)| i)
        .collect();

    sink.record_absorption(ensemble, dt, &absorption_times, &absorption_indices);
    ensemble.delete(&absorption_indices);

    if !absorption_indices.is_empty() {
        debug!(
            "sink absorbed {} of {} particles over dt={}",
            absorption_indices.len(),
            n,
            dt
        );
    }
    Ok(absorption_indices.len())
}

/// Reborrow an optional sink for one sub-step.
pub(crate) fn reborrow<'b>(sink: &'b mut Option<&mut dyn Sink>) -> Option<&'b mut dyn Sink> {
    match sink {
        Some(sink) => Some(&mut **sink as &mut dyn Sink),
        None => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
