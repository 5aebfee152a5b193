//! Coordinate-format sparse matrix used for locally stored blocks.
//!
//! Storage is three parallel arrays (row index, column index, value) plus a
//! complex flag recording whether the source data was complex-typed. The
//! arrays may contain duplicate coordinates and explicitly stored zeros;
//! `compacted`/`true_nnz` fold those away, and the elimination step relies
//! on the compacted view, never the raw entry count. Every structural edit
//! returns a new matrix — nothing mutates shared state.

use std::collections::BTreeMap;

use faer::Mat;
use num_complex::Complex64;
use num_traits::Zero;

use crate::error::BlockError;

#[derive(Clone, Debug, PartialEq)]
pub struct CooMatrix {
    nrows: usize,
    ncols: usize,
    row: Vec<usize>,
    col: Vec<usize>,
    data: Vec<Complex64>,
    complex: bool,
}

impl CooMatrix {
    /// Empty matrix of the given shape.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        CooMatrix {
            nrows,
            ncols,
            row: Vec::new(),
            col: Vec::new(),
            data: Vec::new(),
            complex: false,
        }
    }

    /// Build from real-valued triplets. Fails if the arrays disagree in
    /// length or any coordinate is out of range.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self, BlockError> {
        let data = data.into_iter().map(|v| Complex64::new(v, 0.0)).collect();
        Self::build(nrows, ncols, row, col, data, false)
    }

    /// Build from complex-valued triplets.
    pub fn from_triplets_complex(
        nrows: usize,
        ncols: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        data: Vec<Complex64>,
    ) -> Result<Self, BlockError> {
        Self::build(nrows, ncols, row, col, data, true)
    }

    fn build(
        nrows: usize,
        ncols: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        data: Vec<Complex64>,
        complex: bool,
    ) -> Result<Self, BlockError> {
        if row.len() != data.len() || col.len() != data.len() {
            return Err(BlockError::Conversion(format!(
                "triplet arrays disagree in length: {} rows, {} cols, {} values",
                row.len(),
                col.len(),
                data.len()
            )));
        }
        for &r in &row {
            if r >= nrows {
                return Err(BlockError::IndexOutOfRange {
                    index: r,
                    bound: nrows,
                });
            }
        }
        for &c in &col {
            if c >= ncols {
                return Err(BlockError::IndexOutOfRange {
                    index: c,
                    bound: ncols,
                });
            }
        }
        Ok(CooMatrix {
            nrows,
            ncols,
            row,
            col,
            data,
            complex,
        })
    }

    /// Convert a dense matrix in full; zero entries are not stored.
    pub fn from_dense(mat: &Mat<f64>) -> Self {
        let mut out = CooMatrix::zeros(mat.nrows(), mat.ncols());
        for i in 0..mat.nrows() {
            for j in 0..mat.ncols() {
                let v = mat[(i, j)];
                if v != 0.0 {
                    out.row.push(i);
                    out.col.push(j);
                    out.data.push(Complex64::new(v, 0.0));
                }
            }
        }
        out
    }

    /// Dense column vector as an `(n, 1)` sparse block.
    pub fn from_column(values: &[f64]) -> Self {
        let mut out = CooMatrix::zeros(values.len(), 1);
        for (i, &v) in values.iter().enumerate() {
            if v != 0.0 {
                out.row.push(i);
                out.col.push(0);
                out.data.push(Complex64::new(v, 0.0));
            }
        }
        out
    }

    /// Complex dense column vector as an `(n, 1)` sparse block.
    pub fn from_column_complex(values: &[Complex64]) -> Self {
        let mut out = CooMatrix::zeros(values.len(), 1);
        out.complex = true;
        for (i, &v) in values.iter().enumerate() {
            if !v.is_zero() {
                out.row.push(i);
                out.col.push(0);
                out.data.push(v);
            }
        }
        out
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Raw stored-entry count, duplicates and explicit zeros included.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Structural nonzero count after summing duplicates and dropping
    /// entries that sum to zero.
    pub fn true_nnz(&self) -> usize {
        self.entry_map().len()
    }

    pub fn is_complex(&self) -> bool {
        self.complex
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, Complex64)> + '_ {
        self.row
            .iter()
            .zip(&self.col)
            .zip(&self.data)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Sum of all stored entries at `(i, j)`.
    pub fn value_at(&self, i: usize, j: usize) -> Complex64 {
        self.triplets()
            .filter(|&(r, c, _)| r == i && c == j)
            .map(|(_, _, v)| v)
            .fold(Complex64::zero(), |acc, v| acc + v)
    }

    // Duplicates summed, zero sums dropped; BTreeMap keeps the
    // (row, col) order deterministic.
    fn entry_map(&self) -> BTreeMap<(usize, usize), Complex64> {
        let mut map = BTreeMap::new();
        for (r, c, v) in self.triplets() {
            *map.entry((r, c)).or_insert_with(Complex64::zero) += v;
        }
        map.retain(|_, v| !v.is_zero());
        map
    }

    fn from_entry_map(
        nrows: usize,
        ncols: usize,
        map: BTreeMap<(usize, usize), Complex64>,
        complex: bool,
    ) -> Self {
        let mut out = CooMatrix::zeros(nrows, ncols);
        out.complex = complex;
        for ((r, c), v) in map {
            out.row.push(r);
            out.col.push(c);
            out.data.push(v);
        }
        out
    }

    /// Canonical copy: one entry per coordinate, explicit zeros removed,
    /// sorted by (row, col).
    pub fn compacted(&self) -> Self {
        Self::from_entry_map(self.nrows, self.ncols, self.entry_map(), self.complex)
    }

    /// Row indices holding at least one structural nonzero, ascending.
    pub fn nonzero_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.entry_map().keys().map(|&(r, _)| r).collect();
        rows.dedup();
        rows
    }

    fn check_shape(&self, other: &CooMatrix) -> Result<(), BlockError> {
        if self.shape() != other.shape() {
            return Err(BlockError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &CooMatrix) -> Result<CooMatrix, BlockError> {
        self.check_shape(other)?;
        let mut out = self.clone();
        out.row.extend_from_slice(&other.row);
        out.col.extend_from_slice(&other.col);
        out.data.extend_from_slice(&other.data);
        out.complex = self.complex || other.complex;
        Ok(out.compacted())
    }

    pub fn sub(&self, other: &CooMatrix) -> Result<CooMatrix, BlockError> {
        self.check_shape(other)?;
        let mut out = self.clone();
        out.row.extend_from_slice(&other.row);
        out.col.extend_from_slice(&other.col);
        out.data.extend(other.data.iter().map(|&v| -v));
        out.complex = self.complex || other.complex;
        Ok(out.compacted())
    }

    pub fn neg(&self) -> CooMatrix {
        let mut out = self.clone();
        for v in &mut out.data {
            *v = -*v;
        }
        out
    }

    pub fn transpose(&self) -> CooMatrix {
        CooMatrix {
            nrows: self.ncols,
            ncols: self.nrows,
            row: self.col.clone(),
            col: self.row.clone(),
            data: self.data.clone(),
            complex: self.complex,
        }
    }

    pub fn conj_transpose(&self) -> CooMatrix {
        let mut out = self.transpose();
        for v in &mut out.data {
            *v = v.conj();
        }
        out
    }

    /// Sparse product `self · other`.
    pub fn dot(&self, other: &CooMatrix) -> Result<CooMatrix, BlockError> {
        if self.ncols != other.nrows {
            return Err(BlockError::ShapeMismatch {
                expected: (self.ncols, other.ncols),
                found: other.shape(),
            });
        }
        // Index the right operand by row so each left entry walks only the
        // matching row.
        let mut by_row: Vec<Vec<(usize, Complex64)>> = vec![Vec::new(); other.nrows];
        for (r, c, v) in other.triplets() {
            by_row[r].push((c, v));
        }
        let mut acc: BTreeMap<(usize, usize), Complex64> = BTreeMap::new();
        for (i, k, v) in self.triplets() {
            for &(j, w) in &by_row[k] {
                *acc.entry((i, j)).or_insert_with(Complex64::zero) += v * w;
            }
        }
        acc.retain(|_, v| !v.is_zero());
        Ok(Self::from_entry_map(
            self.nrows,
            other.ncols,
            acc,
            self.complex || other.complex,
        ))
    }

    /// Triple product `Pᴴ · self · P`.
    pub fn rap(&self, p: &CooMatrix) -> Result<CooMatrix, BlockError> {
        p.conj_transpose().dot(&self.dot(p)?)
    }

    fn check_indices(&self, idx: &[usize], bound: usize) -> Result<(), BlockError> {
        for &i in idx {
            if i >= bound {
                return Err(BlockError::IndexOutOfRange { index: i, bound });
            }
        }
        Ok(())
    }

    /// Restrict to the listed rows; the `k`-th listed row becomes row `k`.
    pub fn select_rows(&self, keep: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(keep, self.nrows)?;
        let mut remap: Vec<Option<usize>> = vec![None; self.nrows];
        for (k, &r) in keep.iter().enumerate() {
            remap[r] = Some(k);
        }
        let mut out = CooMatrix::zeros(keep.len(), self.ncols);
        out.complex = self.complex;
        for (r, c, v) in self.triplets() {
            if let Some(nr) = remap[r] {
                out.row.push(nr);
                out.col.push(c);
                out.data.push(v);
            }
        }
        Ok(out)
    }

    /// Restrict to the listed columns; the `k`-th listed column becomes
    /// column `k`.
    pub fn select_cols(&self, keep: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(keep, self.ncols)?;
        let mut remap: Vec<Option<usize>> = vec![None; self.ncols];
        for (k, &c) in keep.iter().enumerate() {
            remap[c] = Some(k);
        }
        let mut out = CooMatrix::zeros(self.nrows, keep.len());
        out.complex = self.complex;
        for (r, c, v) in self.triplets() {
            if let Some(nc) = remap[c] {
                out.row.push(r);
                out.col.push(nc);
                out.data.push(v);
            }
        }
        Ok(out)
    }

    /// 0/1 selector mapping the surviving index space back to the full
    /// one: `P[k, keep[k]] = 1`, so `P · x` picks the surviving entries of
    /// a column vector and `Pᵗ` reinjects them, zero-filling the rest.
    pub fn elimination_matrix(&self, keep: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(keep, self.nrows)?;
        let mut out = CooMatrix::zeros(keep.len(), self.nrows);
        for (k, &z) in keep.iter().enumerate() {
            out.row.push(k);
            out.col.push(z);
            out.data.push(Complex64::new(1.0, 0.0));
        }
        Ok(out)
    }

    /// Copy with the diagonal entries at `idx` set to `value`.
    pub fn set_diag(&self, idx: &[usize], value: f64) -> Result<CooMatrix, BlockError> {
        self.check_indices(idx, self.nrows.min(self.ncols))?;
        let mut map = self.entry_map();
        for &i in idx {
            map.insert((i, i), Complex64::new(value, 0.0));
        }
        map.retain(|_, v| !v.is_zero());
        Ok(Self::from_entry_map(
            self.nrows,
            self.ncols,
            map,
            self.complex,
        ))
    }

    /// Copy with the imaginary part of the diagonal entries at `idx`
    /// dropped.
    pub fn reset_diag_imag(&self, idx: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(idx, self.nrows.min(self.ncols))?;
        let mut map = self.entry_map();
        for &i in idx {
            if let Some(v) = map.get_mut(&(i, i)) {
                *v = Complex64::new(v.re, 0.0);
            }
        }
        map.retain(|_, v| !v.is_zero());
        Ok(Self::from_entry_map(
            self.nrows,
            self.ncols,
            map,
            self.complex,
        ))
    }

    /// Copy with the listed rows zeroed.
    pub fn reset_rows(&self, rows: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(rows, self.nrows)?;
        let mut drop = vec![false; self.nrows];
        for &r in rows {
            drop[r] = true;
        }
        let mut out = CooMatrix::zeros(self.nrows, self.ncols);
        out.complex = self.complex;
        for (r, c, v) in self.triplets() {
            if !drop[r] {
                out.row.push(r);
                out.col.push(c);
                out.data.push(v);
            }
        }
        Ok(out)
    }

    /// Copy with the listed columns zeroed.
    pub fn reset_cols(&self, cols: &[usize]) -> Result<CooMatrix, BlockError> {
        self.check_indices(cols, self.ncols)?;
        let mut drop = vec![false; self.ncols];
        for &c in cols {
            drop[c] = true;
        }
        let mut out = CooMatrix::zeros(self.nrows, self.ncols);
        out.complex = self.complex;
        for (r, c, v) in self.triplets() {
            if !drop[c] {
                out.row.push(r);
                out.col.push(c);
                out.data.push(v);
            }
        }
        Ok(out)
    }

    /// Dense contents of an `(n, 1)` block, zeros included.
    pub fn dense_column(&self) -> Result<Vec<Complex64>, BlockError> {
        if self.ncols != 1 {
            return Err(BlockError::ShapeMismatch {
                expected: (self.nrows, 1),
                found: self.shape(),
            });
        }
        let mut out = vec![Complex64::zero(); self.nrows];
        for (r, _, v) in self.triplets() {
            out[r] += v;
        }
        Ok(out)
    }

    /// Dense copy of the real parts.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut out = Mat::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.triplets() {
            out[(r, c)] += v.re;
        }
        out
    }
}

impl std::fmt::Display for CooMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coo({}, {})", self.nrows, self.ncols)
    }
}
