//! Jacobian sparsity stamps and their resolved matrix offsets.

use crate::error::{Error, Result};

/// A device type's Jacobian sparsity pattern.
///
/// One row per device equation; each row lists the local unknown indices the
/// equation has a nonzero partial derivative with respect to. The stamp is
/// fixed once registered: every nonzero the equation library can produce must
/// appear here, and changing it requires a full re-registration cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JacStamp {
    rows: Vec<Vec<usize>>,
}

impl JacStamp {
    pub fn new(rows: Vec<Vec<usize>>) -> Self {
        Self { rows }
    }

    /// Number of equations.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Local column indices of row `row`.
    pub fn row(&self, row: usize) -> &[usize] {
        &self.rows[row]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Whether `(row, col)` is a declared nonzero position.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(&col))
    }

    /// Check that externally resolved offsets mirror this stamp's shape.
    ///
    /// A mismatch means matrix preallocation disagrees with what the device
    /// will write; that is a fatal configuration error.
    pub fn check_offsets(&self, offsets: &JacOffsets) -> Result<()> {
        if offsets.rows.len() != self.rows.len() {
            return Err(Error::SparsityMismatch(format!(
                "stamp has {} rows but {} offset rows were supplied",
                self.rows.len(),
                offsets.rows.len()
            )));
        }
        for (i, (stamp_row, offset_row)) in self.rows.iter().zip(offsets.rows.iter()).enumerate() {
            if stamp_row.len() != offset_row.len() {
                return Err(Error::SparsityMismatch(format!(
                    "row {i}: stamp declares {} entries but {} offsets were supplied",
                    stamp_row.len(),
                    offset_row.len()
                )));
            }
        }
        Ok(())
    }
}

/// Flat offsets into global sparse-matrix storage, one per stamp entry.
///
/// Resolved by the linear-algebra collaborator; the device only caches them
/// for O(1) accumulation during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JacOffsets {
    rows: Vec<Vec<usize>>,
}

impl JacOffsets {
    pub fn new(rows: Vec<Vec<usize>>) -> Self {
        Self { rows }
    }

    pub fn row(&self, row: usize) -> &[usize] {
        &self.rows[row]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }
}

/// Per-instance cache of partial derivatives, one slot per stamp entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedValues {
    rows: Vec<Vec<f64>>,
}

impl StampedValues {
    /// A zeroed cache shaped like `stamp`.
    pub fn zeros_like(stamp: &JacStamp) -> Self {
        Self {
            rows: stamp.rows.iter().map(|r| vec![0.0; r.len()]).collect(),
        }
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.rows[row]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.rows[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_match_accepted() {
        let stamp = JacStamp::new(vec![vec![0, 1], vec![0]]);
        let offsets = JacOffsets::new(vec![vec![4, 7], vec![9]]);
        stamp.check_offsets(&offsets).unwrap();
    }

    #[test]
    fn test_row_length_mismatch_rejected() {
        let stamp = JacStamp::new(vec![vec![0, 1], vec![0]]);
        let offsets = JacOffsets::new(vec![vec![4, 7], vec![9, 11]]);
        let err = stamp.check_offsets(&offsets).unwrap_err();
        assert!(matches!(err, Error::SparsityMismatch(_)));
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let stamp = JacStamp::new(vec![vec![0, 1], vec![0]]);
        let offsets = JacOffsets::new(vec![vec![4, 7]]);
        assert!(stamp.check_offsets(&offsets).is_err());
    }

    #[test]
    fn test_stamped_values_follow_shape() {
        let stamp = JacStamp::new(vec![vec![0, 1, 2], vec![1]]);
        let mut vals = StampedValues::zeros_like(&stamp);
        assert_eq!(vals.row(0).len(), 3);
        assert_eq!(vals.row(1).len(), 1);
        vals.row_mut(1)[0] = 2.5;
        assert_eq!(vals.row(1)[0], 2.5);
    }
}
