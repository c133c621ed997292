//! Conversions between row-major feature rows and `ndarray` matrices.

use ndarray::{Array2, ArrayView1};

/// Width of the first row, or 0 for an empty table.
pub(crate) fn width(x: &[Vec<f64>]) -> usize {
    x.first().map_or(0, Vec::len)
}

/// Copy rows into an `n x width` matrix. Short rows are zero-padded and long
/// rows truncated, so the result always has the requested shape.
pub(crate) fn to_array(x: &[Vec<f64>], width: usize) -> Array2<f64> {
    Array2::from_shape_fn((x.len(), width), |(i, j)| {
        x[i].get(j).copied().unwrap_or(0.0)
    })
}

pub(crate) fn to_rows(a: &Array2<f64>) -> Vec<Vec<f64>> {
    a.outer_iter().map(|row| row.to_vec()).collect()
}

/// Borrow a slice as a one-dimensional view.
pub(crate) fn view(values: &[f64]) -> ArrayView1<'_, f64> {
    ArrayView1::from(values)
}
