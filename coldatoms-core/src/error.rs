//! Error types for the integration core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// An array's leading dimension does not match the particle count.
    #[error("shape mismatch for {what}: expected {expected} rows, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("to accelerate particles the ensemble needs a `mass` ensemble or particle property")]
    MissingMass,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("numerical anomaly: {0}")]
    NumericalAnomaly(String),
}

impl Error {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
