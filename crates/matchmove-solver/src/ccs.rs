//! Compressed-column sparse matrix used by the sparse backend.

use matchmove_core::Real;
use nalgebra::{DMatrix, DVector};

/// Column-compressed matrix with a fixed structural pattern.
///
/// Row indices within each column are stored in ascending order, which the
/// product routines below rely on.
#[derive(Debug, Clone)]
pub struct CcsMatrix {
    nrows: usize,
    ncols: usize,
    colptr: Vec<usize>,
    rowidx: Vec<usize>,
    values: Vec<Real>,
}

impl CcsMatrix {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of structural non-zeros.
    pub fn nnz(&self) -> usize {
        self.rowidx.len()
    }

    /// Row indices of one column.
    pub fn column_rows(&self, col: usize) -> &[usize] {
        &self.rowidx[self.colptr[col]..self.colptr[col + 1]]
    }

    /// Values of one column.
    pub fn column_values(&self, col: usize) -> &[Real] {
        &self.values[self.colptr[col]..self.colptr[col + 1]]
    }

    pub fn column_values_mut(&mut self, col: usize) -> &mut [Real] {
        &mut self.values[self.colptr[col]..self.colptr[col + 1]]
    }

    /// Row indices and mutable values of one column.
    pub fn column_mut(&mut self, col: usize) -> (&[usize], &mut [Real]) {
        let lo = self.colptr[col];
        let hi = self.colptr[col + 1];
        (&self.rowidx[lo..hi], &mut self.values[lo..hi])
    }

    /// `out = self^T * self`, dense. With row indices sorted per column the
    /// per-entry work is a single merge over the two columns.
    pub fn tr_mul_self_into(&self, out: &mut DMatrix<Real>) {
        debug_assert_eq!(out.nrows(), self.ncols);
        debug_assert_eq!(out.ncols(), self.ncols);
        out.fill(0.0);
        for j in 0..self.ncols {
            for k in j..self.ncols {
                let dot = self.column_dot(j, k);
                out[(j, k)] = dot;
                out[(k, j)] = dot;
            }
        }
    }

    /// `out = self^T * v`.
    pub fn tr_mul_vec_into(&self, v: &DVector<Real>, out: &mut DVector<Real>) {
        debug_assert_eq!(v.len(), self.nrows);
        debug_assert_eq!(out.len(), self.ncols);
        for j in 0..self.ncols {
            let rows = self.column_rows(j);
            let vals = self.column_values(j);
            let mut acc = 0.0;
            for (&i, &a) in rows.iter().zip(vals) {
                acc += a * v[i];
            }
            out[j] = acc;
        }
    }

    fn column_dot(&self, a: usize, b: usize) -> Real {
        let ra = self.column_rows(a);
        let va = self.column_values(a);
        let rb = self.column_rows(b);
        let vb = self.column_values(b);
        let (mut i, mut k) = (0, 0);
        let mut acc = 0.0;
        while i < ra.len() && k < rb.len() {
            match ra[i].cmp(&rb[k]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => k += 1,
                std::cmp::Ordering::Equal => {
                    acc += va[i] * vb[k];
                    i += 1;
                    k += 1;
                }
            }
        }
        acc
    }
}

/// Incremental column-major pattern builder.
///
/// Row storage starts at a small capacity and doubles whenever it fills,
/// so a badly underestimated non-zero count never forces a restart.
#[derive(Debug)]
pub struct CcsPatternBuilder {
    nrows: usize,
    ncols: usize,
    colptr: Vec<usize>,
    rowidx: Vec<usize>,
}

impl CcsPatternBuilder {
    pub fn new(nrows: usize, ncols: usize, nnz_hint: usize) -> Self {
        Self {
            nrows,
            ncols,
            colptr: Vec::with_capacity(ncols + 1),
            rowidx: Vec::with_capacity(nnz_hint.max(1)),
        }
    }

    /// Open the next column. Columns must be opened in order, one per matrix
    /// column.
    pub fn begin_column(&mut self) {
        debug_assert!(self.colptr.len() < self.ncols);
        self.colptr.push(self.rowidx.len());
    }

    /// Mark `row` structurally non-zero in the current column. Rows must be
    /// pushed in ascending order.
    pub fn push_row(&mut self, row: usize) {
        debug_assert!(row < self.nrows);
        self.rowidx.push(row);
    }

    /// Seal the pattern; values start zeroed.
    pub fn finish(mut self) -> CcsMatrix {
        while self.colptr.len() < self.ncols {
            self.colptr.push(self.rowidx.len());
        }
        self.colptr.push(self.rowidx.len());
        let nnz = self.rowidx.len();
        CcsMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            colptr: self.colptr,
            rowidx: self.rowidx,
            values: vec![0.0; nnz],
        }
    }
}
