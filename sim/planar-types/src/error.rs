//! Error types for simulation operations.

use thiserror::Error;

use crate::BodyHandle;

/// Errors that can occur while assembling or stepping the simulation.
///
/// Dimension and index errors indicate a bug in system assembly and are
/// propagated to the caller of `step()`. Numerical degeneracies (coincident
/// spring endpoints, solver non-convergence) are absorbed internally and only
/// show up in diagnostics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Two operands of a vector or matrix operation have incompatible lengths.
    #[error("dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The operation that was attempted.
        operation: &'static str,
        /// Length the operation required.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// A sparse entry was pushed outside the matrix shape.
    #[error("entry ({row}, {col}) out of bounds for {nrows}x{ncols} matrix")]
    IndexOutOfBounds {
        /// Row of the rejected entry.
        row: usize,
        /// Column of the rejected entry.
        col: usize,
        /// Number of matrix rows.
        nrows: usize,
        /// Number of matrix columns.
        ncols: usize,
    },

    /// A body handle does not refer to a live body.
    #[error("stale body handle: {0:?}")]
    StaleBody(BodyHandle),

    /// A two-body constraint or spring names the same body at both ends.
    #[error("body {0:?} cannot be joined to itself")]
    SelfLink(BodyHandle),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid substep count.
    #[error("invalid substep count: {0} (must be at least 1)")]
    InvalidSubsteps(usize),

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(operation: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            operation,
            expected,
            actual,
        }
    }

    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Check if this is a dimension mismatch.
    #[must_use]
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::dimension_mismatch("add", 3, 4);
        let msg = err.to_string();
        assert!(msg.contains("add"));
        assert!(msg.contains('3'));
        assert!(msg.contains('4'));

        let err = SimError::IndexOutOfBounds {
            row: 7,
            col: 2,
            nrows: 3,
            ncols: 6,
        };
        assert!(err.to_string().contains("3x6"));

        let err = SimError::diverged("NaN in velocity");
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::diverged("test");
        assert!(err.is_diverged());
        assert!(!err.is_config_error());
        assert!(!err.is_dimension_mismatch());

        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_diverged());

        assert!(SimError::dimension_mismatch("dot", 1, 2).is_dimension_mismatch());
    }

    #[test]
    fn test_self_link_display() {
        let mut keys = slotmap::SlotMap::<BodyHandle, ()>::with_key();
        let body = keys.insert(());
        let err = SimError::SelfLink(body);
        assert!(err.to_string().contains("itself"));
        assert!(!err.is_config_error());
    }
}
