//! DAE vector/matrix accumulation interfaces and a dense reference
//! implementation.
//!
//! The real simulator's distributed residual/charge vectors and sparse
//! Jacobians live in the linear-algebra layer; devices see them only through
//! the add-only loader traits below. [`DenseDae`] is the in-process dense
//! implementation used by the driver and the test suites.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::lids::LocalIds;
use crate::stamp::{JacOffsets, JacStamp};

/// Indexed additive access to a global vector.
///
/// Accumulation must be additive, never overwrite: multiple devices
/// legitimately contribute to the same index.
pub trait VectorLoader {
    fn add(&mut self, index: usize, value: f64);
}

/// Additive access to global sparse-matrix storage via pre-resolved flat
/// offsets.
pub trait MatrixLoader {
    fn add(&mut self, offset: usize, value: f64);
}

impl VectorLoader for DVector<f64> {
    fn add(&mut self, index: usize, value: f64) {
        self[index] += value;
    }
}

/// Dense matrix addressed by row-major flat offset.
pub struct DenseMatrixLoader<'a> {
    matrix: &'a mut DMatrix<f64>,
    size: usize,
}

impl MatrixLoader for DenseMatrixLoader<'_> {
    fn add(&mut self, offset: usize, value: f64) {
        let row = offset / self.size;
        let col = offset % self.size;
        self.matrix[(row, col)] += value;
    }
}

/// Dense reference storage for the global DAE system `dQ/dt + F = 0`.
///
/// Holds the residual vector F, the charge vector Q, and the Jacobians
/// dF/dx and dQ/dx, all sized by the total unknown count. Also plays the
/// linear-algebra collaborator's role of resolving a device's sparsity stamp
/// into flat offsets (row-major here; a sparse backend would hand back CRS
/// positions behind the same `usize` offsets).
#[derive(Debug, Clone)]
pub struct DenseDae {
    pub f: DVector<f64>,
    pub q: DVector<f64>,
    pub dfdx: DMatrix<f64>,
    pub dqdx: DMatrix<f64>,
    size: usize,
}

impl DenseDae {
    pub fn new(size: usize) -> Self {
        Self {
            f: DVector::zeros(size),
            q: DVector::zeros(size),
            dfdx: DMatrix::zeros(size, size),
            dqdx: DMatrix::zeros(size, size),
            size,
        }
    }

    /// Total number of unknowns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Zero everything ahead of a fresh accumulation pass.
    pub fn clear(&mut self) {
        self.f.fill(0.0);
        self.q.fill(0.0);
        self.dfdx.fill(0.0);
        self.dqdx.fill(0.0);
    }

    /// Resolve a device's stamp into flat offsets, given its bound local
    /// indices. Row `r` of the stamp is the equation owned by local unknown
    /// `r`; each column entry is a local unknown index.
    pub fn resolve_offsets(&self, lids: &LocalIds, stamp: &JacStamp) -> Result<JacOffsets> {
        let mut rows = Vec::with_capacity(stamp.num_rows());
        for r in 0..stamp.num_rows() {
            let global_row = lids.unknown(r);
            let row = stamp
                .row(r)
                .iter()
                .map(|&c| global_row * self.size + lids.unknown(c))
                .collect();
            rows.push(row);
        }
        Ok(JacOffsets::new(rows))
    }

    pub fn f_loader(&mut self) -> &mut DVector<f64> {
        &mut self.f
    }

    pub fn q_loader(&mut self) -> &mut DVector<f64> {
        &mut self.q
    }

    pub fn dfdx_loader(&mut self) -> DenseMatrixLoader<'_> {
        DenseMatrixLoader {
            matrix: &mut self.dfdx,
            size: self.size,
        }
    }

    pub fn dqdx_loader(&mut self) -> DenseMatrixLoader<'_> {
        DenseMatrixLoader {
            matrix: &mut self.dqdx,
            size: self.size,
        }
    }
}
