//! Checked dense-vector arithmetic.
//!
//! nalgebra panics when dynamically sized operands disagree in length. The
//! assembly code routes its vector arithmetic through these helpers instead,
//! so a shape bug surfaces as [`SimError::DimensionMismatch`] from `step()`.

use nalgebra::DVector;
use planar_types::{Result, SimError};

fn check(operation: &'static str, a: &DVector<f64>, b: &DVector<f64>) -> Result<()> {
    if a.len() == b.len() {
        Ok(())
    } else {
        Err(SimError::dimension_mismatch(operation, a.len(), b.len()))
    }
}

/// `a + b`.
pub fn add(a: &DVector<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check("add", a, b)?;
    Ok(a + b)
}

/// `a - b`.
pub fn sub(a: &DVector<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check("sub", a, b)?;
    Ok(a - b)
}

/// `a · b`.
pub fn dot(a: &DVector<f64>, b: &DVector<f64>) -> Result<f64> {
    check("dot", a, b)?;
    Ok(a.dot(b))
}

/// Element-wise product `a ⊙ b`.
pub fn component_mul(a: &DVector<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check("component_mul", a, b)?;
    Ok(a.component_mul(b))
}

/// Grow with zeros or truncate to `len`, keeping the leading entries.
pub fn resize_zero_extend(v: &mut DVector<f64>, len: usize) {
    if v.len() != len {
        v.resize_vertically_mut(len, 0.0);
    }
}
