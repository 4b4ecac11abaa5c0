//! Per-step observability metrics.

use planar_constraint::SolveReport;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metrics refreshed at the end of every substep.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    /// Total kinetic energy, translational plus rotational.
    pub kinetic_energy: f64,
    /// Sum of generator energies, interaction spring included.
    pub potential_energy: f64,
    /// `kinetic_energy + potential_energy`.
    pub system_energy: f64,
    /// `‖C‖` from the last assembly (zero without constraints).
    pub constraint_error: f64,
    /// `‖Ċ‖` from the last assembly (zero without constraints).
    pub constraint_velocity_error: f64,
    /// Sum of final solver residuals since creation.
    pub accumulated_solver_error: f64,
    /// Number of solves that ran out of iterations.
    pub unconverged_solves: usize,
    /// Report of the most recent solve.
    pub last_solve: Option<SolveReport>,
}

impl Diagnostics {
    /// Whether any solve so far has failed to converge.
    #[must_use]
    pub const fn has_unconverged_solves(&self) -> bool {
        self.unconverged_solves > 0
    }
}
