//! Row-partitioned distributed sparse matrix and partitioned dense vector.
//!
//! Each rank owns a contiguous slice of global rows; column indices stay
//! global. Operations that need remote entries (transpose, product,
//! reassembled vectors) go through the `Comm` all-gather; selection and
//! elimination-matrix construction work on sorted global survivor lists
//! and need no communication at all.

use num_complex::Complex64;
use num_traits::Zero;

use crate::error::BlockError;
use crate::matrix::coo::CooMatrix;
use crate::parallel::Comm;

/// Contiguous `[start, end)` global index range owned by this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    /// The whole range, i.e. a single-rank partition.
    pub fn full(n: usize) -> Self {
        Partition { start: 0, end: n }
    }

    /// Uniform block partition of `n` items over `size` ranks.
    pub fn uniform(n: usize, rank: usize, size: usize) -> Self {
        let chunk = (n + size - 1) / size;
        Partition {
            start: (rank * chunk).min(n),
            end: ((rank + 1) * chunk).min(n),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, i: usize) -> bool {
        i >= self.start && i < self.end
    }

    /// Owned range within the reduced index space defined by a sorted
    /// global survivor list.
    pub fn restrict(&self, survivors: &[usize]) -> Partition {
        Partition {
            start: survivors.partition_point(|&k| k < self.start),
            end: survivors.partition_point(|&k| k < self.end),
        }
    }
}

/// Sparse matrix whose rows are partitioned across ranks.
///
/// `local` stores the owned rows with rank-local row indices and global
/// column indices; its shape is `(row_part.len(), global_cols)`.
#[derive(Clone, Debug)]
pub struct DistMatrix {
    global_rows: usize,
    global_cols: usize,
    row_part: Partition,
    col_part: Partition,
    local: CooMatrix,
}

impl DistMatrix {
    pub fn from_local(
        global_rows: usize,
        global_cols: usize,
        row_part: Partition,
        col_part: Partition,
        local: CooMatrix,
    ) -> Result<Self, BlockError> {
        if row_part.end > global_rows || col_part.end > global_cols {
            return Err(BlockError::Conversion(format!(
                "partition exceeds global shape ({global_rows}, {global_cols})"
            )));
        }
        if local.shape() != (row_part.len(), global_cols) {
            return Err(BlockError::Conversion(format!(
                "local block shape {:?} does not match partition ({} owned rows, {} global cols)",
                local.shape(),
                row_part.len(),
                global_cols
            )));
        }
        Ok(DistMatrix {
            global_rows,
            global_cols,
            row_part,
            col_part,
            local,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.global_rows, self.global_cols)
    }

    pub fn row_partition(&self) -> Partition {
        self.row_part
    }

    pub fn col_partition(&self) -> Partition {
        self.col_part
    }

    /// Local-coordinate view: owned rows only.
    pub fn local_coo(&self) -> &CooMatrix {
        &self.local
    }

    /// Stored entries on this rank.
    pub fn nnz(&self) -> usize {
        self.local.nnz()
    }

    /// Structural nonzeros on this rank, explicit zeros purged.
    pub fn true_nnz(&self) -> usize {
        self.local.true_nnz()
    }

    pub fn is_complex(&self) -> bool {
        self.local.is_complex()
    }

    /// Rank-local indices of owned rows with a structural nonzero.
    pub fn nonzero_local_rows(&self) -> Vec<usize> {
        self.local.nonzero_rows()
    }

    /// Owned triplets in global coordinates, compacted.
    pub fn global_triplets(&self) -> (Vec<usize>, Vec<usize>, Vec<Complex64>) {
        let compact = self.local.compacted();
        let mut rows = Vec::with_capacity(compact.nnz());
        let mut cols = Vec::with_capacity(compact.nnz());
        let mut data = Vec::with_capacity(compact.nnz());
        for (r, c, v) in compact.triplets() {
            rows.push(r + self.row_part.start);
            cols.push(c);
            data.push(v);
        }
        (rows, cols, data)
    }

    // Every rank's compacted triplets in global coordinates, plus the
    // OR of every rank's complex flag.
    fn gathered_triplets(&self, comm: &dyn Comm) -> (Vec<(usize, usize, Complex64)>, bool) {
        let (rows, cols, data) = self.global_triplets();
        let rows_g = comm.all_gather_u64(&rows.iter().map(|&r| r as u64).collect::<Vec<_>>());
        let cols_g = comm.all_gather_u64(&cols.iter().map(|&c| c as u64).collect::<Vec<_>>());
        let re_g = comm.all_gather_f64(&data.iter().map(|v| v.re).collect::<Vec<_>>());
        let im_g = comm.all_gather_f64(&data.iter().map(|v| v.im).collect::<Vec<_>>());
        let flags = comm.all_gather_u64(&[self.is_complex() as u64]);
        let triplets = rows_g
            .into_iter()
            .zip(cols_g)
            .zip(re_g.into_iter().zip(im_g))
            .map(|((r, c), (re, im))| (r as usize, c as usize, Complex64::new(re, im)))
            .collect();
        (triplets, flags.iter().any(|&f| f != 0))
    }

    fn same_layout(&self, other: &DistMatrix) -> Result<(), BlockError> {
        if self.shape() != other.shape() {
            return Err(BlockError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        if self.row_part != other.row_part || self.col_part != other.col_part {
            return Err(BlockError::UnsupportedBlock(
                "distributed operands must share partitions",
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &DistMatrix) -> Result<DistMatrix, BlockError> {
        self.same_layout(other)?;
        let mut out = self.clone();
        out.local = self.local.add(&other.local)?;
        Ok(out)
    }

    pub fn sub(&self, other: &DistMatrix) -> Result<DistMatrix, BlockError> {
        self.same_layout(other)?;
        let mut out = self.clone();
        out.local = self.local.sub(&other.local)?;
        Ok(out)
    }

    pub fn neg(&self) -> DistMatrix {
        let mut out = self.clone();
        out.local = self.local.neg();
        out
    }

    fn transpose_impl(&self, comm: &dyn Comm, conj: bool) -> Result<DistMatrix, BlockError> {
        let (triplets, complex) = self.gathered_triplets(comm);
        // Rows of the transpose are the original columns, so ownership
        // follows the column partition.
        let part = self.col_part;
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();
        for (r, c, v) in triplets {
            if part.contains(c) {
                row.push(c - part.start);
                col.push(r);
                data.push(if conj { v.conj() } else { v });
            }
        }
        let local = if complex {
            CooMatrix::from_triplets_complex(part.len(), self.global_rows, row, col, data)?
        } else {
            CooMatrix::from_triplets(
                part.len(),
                self.global_rows,
                row,
                col,
                data.iter().map(|v| v.re).collect(),
            )?
        };
        DistMatrix::from_local(
            self.global_cols,
            self.global_rows,
            part,
            self.row_part,
            local.compacted(),
        )
    }

    pub fn transpose(&self, comm: &dyn Comm) -> Result<DistMatrix, BlockError> {
        self.transpose_impl(comm, false)
    }

    pub fn conj_transpose(&self, comm: &dyn Comm) -> Result<DistMatrix, BlockError> {
        self.transpose_impl(comm, true)
    }

    /// Distributed product `self · other`. The right operand is
    /// reassembled from every rank; the result keeps this rank's row
    /// partition and `other`'s column partition.
    pub fn dot(&self, other: &DistMatrix, comm: &dyn Comm) -> Result<DistMatrix, BlockError> {
        if self.global_cols != other.global_rows {
            return Err(BlockError::ShapeMismatch {
                expected: (self.global_cols, other.global_cols),
                found: other.shape(),
            });
        }
        let (rhs, rhs_complex) = other.gathered_triplets(comm);
        let mut by_row: Vec<Vec<(usize, Complex64)>> = vec![Vec::new(); other.global_rows];
        for (r, c, v) in rhs {
            by_row[r].push((c, v));
        }
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();
        for (i, k, v) in self.local.triplets() {
            for &(j, w) in &by_row[k] {
                row.push(i);
                col.push(j);
                data.push(v * w);
            }
        }
        let complex = self.is_complex() || rhs_complex;
        let local = if complex {
            CooMatrix::from_triplets_complex(self.row_part.len(), other.global_cols, row, col, data)?
        } else {
            CooMatrix::from_triplets(
                self.row_part.len(),
                other.global_cols,
                row,
                col,
                data.iter().map(|v| v.re).collect(),
            )?
        };
        DistMatrix::from_local(
            self.global_rows,
            other.global_cols,
            self.row_part,
            other.col_part,
            local.compacted(),
        )
    }

    /// Matrix-vector product against a partitioned vector.
    pub fn dot_vec(&self, v: &DistVector, comm: &dyn Comm) -> Result<DistVector, BlockError> {
        if self.global_cols != v.global_len() {
            return Err(BlockError::ShapeMismatch {
                expected: (self.global_cols, 1),
                found: v.shape(),
            });
        }
        let x = v.global_vector(comm);
        let mut out = vec![Complex64::zero(); self.row_part.len()];
        for (i, k, w) in self.local.triplets() {
            out[i] += w * x[k];
        }
        DistVector::from_slice(
            self.global_rows,
            self.row_part,
            out,
            self.is_complex() || v.is_complex(),
        )
    }

    /// Restrict to the sorted global row survivors. Ownership follows the
    /// restriction of the current row partition; no communication.
    pub fn select_rows(&self, survivors: &[usize]) -> Result<DistMatrix, BlockError> {
        for &k in survivors {
            if k >= self.global_rows {
                return Err(BlockError::IndexOutOfRange {
                    index: k,
                    bound: self.global_rows,
                });
            }
        }
        let new_part = self.row_part.restrict(survivors);
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();
        let mut remap: Vec<Option<usize>> = vec![None; self.row_part.len()];
        for k in new_part.start..new_part.end {
            remap[survivors[k] - self.row_part.start] = Some(k - new_part.start);
        }
        for (r, c, v) in self.local.triplets() {
            if let Some(nr) = remap[r] {
                row.push(nr);
                col.push(c);
                data.push(v);
            }
        }
        let local = if self.is_complex() {
            CooMatrix::from_triplets_complex(new_part.len(), self.global_cols, row, col, data)?
        } else {
            CooMatrix::from_triplets(
                new_part.len(),
                self.global_cols,
                row,
                col,
                data.iter().map(|v| v.re).collect(),
            )?
        };
        DistMatrix::from_local(
            survivors.len(),
            self.global_cols,
            new_part,
            self.col_part,
            local,
        )
    }

    /// Restrict to the sorted global column survivors; purely local since
    /// stored column indices are global.
    pub fn select_cols(&self, survivors: &[usize]) -> Result<DistMatrix, BlockError> {
        for &k in survivors {
            if k >= self.global_cols {
                return Err(BlockError::IndexOutOfRange {
                    index: k,
                    bound: self.global_cols,
                });
            }
        }
        let mut remap: Vec<Option<usize>> = vec![None; self.global_cols];
        for (k, &c) in survivors.iter().enumerate() {
            remap[c] = Some(k);
        }
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();
        for (r, c, v) in self.local.triplets() {
            if let Some(nc) = remap[c] {
                row.push(r);
                col.push(nc);
                data.push(v);
            }
        }
        let local = if self.is_complex() {
            CooMatrix::from_triplets_complex(self.row_part.len(), survivors.len(), row, col, data)?
        } else {
            CooMatrix::from_triplets(
                self.row_part.len(),
                survivors.len(),
                row,
                col,
                data.iter().map(|v| v.re).collect(),
            )?
        };
        DistMatrix::from_local(
            self.global_rows,
            survivors.len(),
            self.row_part,
            self.col_part.restrict(survivors),
            local,
        )
    }

    /// Partitioned 0/1 selector mapping the survivor space back to this
    /// matrix's row space: `P[k, survivors[k]] = 1`, rows owned per the
    /// restricted partition.
    pub fn elimination_matrix(&self, survivors: &[usize]) -> Result<DistMatrix, BlockError> {
        for &k in survivors {
            if k >= self.global_rows {
                return Err(BlockError::IndexOutOfRange {
                    index: k,
                    bound: self.global_rows,
                });
            }
        }
        let new_part = self.row_part.restrict(survivors);
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();
        for k in new_part.start..new_part.end {
            row.push(k - new_part.start);
            col.push(survivors[k]);
            data.push(1.0);
        }
        let local = CooMatrix::from_triplets(new_part.len(), self.global_rows, row, col, data)?;
        DistMatrix::from_local(
            survivors.len(),
            self.global_rows,
            new_part,
            self.row_part,
            local,
        )
    }
}

impl std::fmt::Display for DistMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DistCoo({}, {})", self.global_rows, self.global_cols)
    }
}

/// Dense vector partitioned across ranks, with a column/row orientation
/// bit so that transposition round-trips.
#[derive(Clone, Debug)]
pub struct DistVector {
    global_len: usize,
    part: Partition,
    data: Vec<Complex64>,
    complex: bool,
    column: bool,
}

impl DistVector {
    pub fn from_slice(
        global_len: usize,
        part: Partition,
        data: Vec<Complex64>,
        complex: bool,
    ) -> Result<Self, BlockError> {
        if part.end > global_len || data.len() != part.len() {
            return Err(BlockError::Conversion(format!(
                "owned slice of length {} does not match partition [{}, {}) of {} entries",
                data.len(),
                part.start,
                part.end,
                global_len
            )));
        }
        Ok(DistVector {
            global_len,
            part,
            data,
            complex,
            column: true,
        })
    }

    pub fn global_len(&self) -> usize {
        self.global_len
    }

    pub fn partition(&self) -> Partition {
        self.part
    }

    pub fn local_data(&self) -> &[Complex64] {
        &self.data
    }

    pub fn shape(&self) -> (usize, usize) {
        if self.column {
            (self.global_len, 1)
        } else {
            (1, self.global_len)
        }
    }

    /// Locally stored nonzero entries.
    pub fn nnz(&self) -> usize {
        self.data.iter().filter(|v| !v.is_zero()).count()
    }

    pub fn is_complex(&self) -> bool {
        self.complex
    }

    pub fn transpose(&self) -> DistVector {
        let mut out = self.clone();
        out.column = !self.column;
        out
    }

    /// Collective query: true when every rank's slice is all-zero.
    pub fn is_all_zero(&self, comm: &dyn Comm) -> bool {
        let local = self.data.iter().all(Zero::is_zero) as u64;
        comm.all_gather_u64(&[local]).iter().all(|&f| f != 0)
    }

    /// Reassemble the full dense vector on every rank (owned slices are
    /// concatenated in rank order).
    pub fn global_vector(&self, comm: &dyn Comm) -> Vec<Complex64> {
        let re = comm.all_gather_f64(&self.data.iter().map(|v| v.re).collect::<Vec<_>>());
        let im = comm.all_gather_f64(&self.data.iter().map(|v| v.im).collect::<Vec<_>>());
        re.into_iter()
            .zip(im)
            .map(|(re, im)| Complex64::new(re, im))
            .collect()
    }

    fn same_layout(&self, other: &DistVector) -> Result<(), BlockError> {
        if self.shape() != other.shape() {
            return Err(BlockError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        if self.part != other.part {
            return Err(BlockError::UnsupportedBlock(
                "distributed operands must share partitions",
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &DistVector) -> Result<DistVector, BlockError> {
        self.same_layout(other)?;
        let mut out = self.clone();
        for (a, &b) in out.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        out.complex = self.complex || other.complex;
        Ok(out)
    }

    pub fn sub(&self, other: &DistVector) -> Result<DistVector, BlockError> {
        self.same_layout(other)?;
        let mut out = self.clone();
        for (a, &b) in out.data.iter_mut().zip(&other.data) {
            *a -= b;
        }
        out.complex = self.complex || other.complex;
        Ok(out)
    }

    pub fn neg(&self) -> DistVector {
        let mut out = self.clone();
        for v in &mut out.data {
            *v = -*v;
        }
        out
    }

    /// Restrict to the sorted global survivors, keeping the owned ones.
    pub fn select_rows(&self, survivors: &[usize]) -> Result<DistVector, BlockError> {
        for &k in survivors {
            if k >= self.global_len {
                return Err(BlockError::IndexOutOfRange {
                    index: k,
                    bound: self.global_len,
                });
            }
        }
        let new_part = self.part.restrict(survivors);
        let data = (new_part.start..new_part.end)
            .map(|k| self.data[survivors[k] - self.part.start])
            .collect();
        DistVector::from_slice(survivors.len(), new_part, data, self.complex)
    }

    /// Column selection on an `(n, 1)` vector only makes sense for the
    /// single column it has.
    pub fn select_cols(&self, survivors: &[usize]) -> Result<DistVector, BlockError> {
        match survivors {
            [0] => Ok(self.clone()),
            [] => {
                let mut out = self.clone();
                out.global_len = 0;
                out.part = Partition::full(0);
                out.data.clear();
                Ok(out)
            }
            _ => Err(BlockError::UnsupportedBlock(
                "column selection on a vector block",
            )),
        }
    }
}

impl std::fmt::Display for DistVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DistVec({})", self.global_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;
    use approx::assert_abs_diff_eq;

    fn full_dist(coo: CooMatrix) -> DistMatrix {
        let (r, c) = coo.shape();
        DistMatrix::from_local(r, c, Partition::full(r), Partition::full(c), coo).unwrap()
    }

    #[test]
    fn partition_restrict_counts_survivors() {
        let part = Partition { start: 4, end: 8 };
        // survivors 2,5,7,9 -> one below the range, two inside
        let new = part.restrict(&[2, 5, 7, 9]);
        assert_eq!(new, Partition { start: 1, end: 3 });
    }

    #[test]
    fn uniform_partitions_cover_range() {
        let parts: Vec<Partition> = (0..3).map(|r| Partition::uniform(10, r, 3)).collect();
        assert_eq!(parts[0], Partition { start: 0, end: 4 });
        assert_eq!(parts[2].end, 10);
        let total: usize = parts.iter().map(Partition::len).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn single_rank_transpose_matches_local() {
        let comm = SerialComm;
        let coo =
            CooMatrix::from_triplets(2, 3, vec![0, 1], vec![2, 0], vec![7.0, -1.0]).unwrap();
        let dist = full_dist(coo.clone());
        let t = dist.transpose(&comm).unwrap();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.local_coo().compacted(), coo.transpose().compacted());
    }

    #[test]
    fn single_rank_dot_matches_local() {
        let comm = SerialComm;
        let a = CooMatrix::from_triplets(2, 2, vec![0, 1], vec![0, 1], vec![2.0, 3.0]).unwrap();
        let b = CooMatrix::from_triplets(2, 2, vec![0, 1], vec![1, 0], vec![1.0, 1.0]).unwrap();
        let c = full_dist(a.clone()).dot(&full_dist(b.clone()), &comm).unwrap();
        assert_eq!(c.local_coo().compacted(), a.dot(&b).unwrap().compacted());
    }

    #[test]
    fn select_rows_renumbers_partition() {
        let coo = CooMatrix::from_triplets(
            4,
            4,
            vec![0, 1, 3],
            vec![0, 1, 3],
            vec![1.0, 2.0, 4.0],
        )
        .unwrap();
        let dist = full_dist(coo);
        let reduced = dist.select_rows(&[0, 1, 3]).unwrap();
        assert_eq!(reduced.shape(), (3, 4));
        assert_eq!(reduced.row_partition(), Partition::full(3));
        assert_abs_diff_eq!(
            reduced.local_coo().value_at(2, 3).re,
            4.0,
            epsilon = 1e-14
        );
    }

    #[test]
    fn vector_gather_and_zero_check() {
        let comm = SerialComm;
        let v = DistVector::from_slice(
            3,
            Partition::full(3),
            vec![
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(2.0, 0.0),
            ],
            false,
        )
        .unwrap();
        assert!(!v.is_all_zero(&comm));
        let g = v.global_vector(&comm);
        assert_eq!(g.len(), 3);
        assert_abs_diff_eq!(g[2].re, 2.0, epsilon = 1e-14);
        let z = DistVector::from_slice(2, Partition::full(2), vec![Complex64::zero(); 2], false)
            .unwrap();
        assert!(z.is_all_zero(&comm));
    }

    #[test]
    fn vector_transpose_round_trips() {
        let v = DistVector::from_slice(
            2,
            Partition::full(2),
            vec![Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)],
            false,
        )
        .unwrap();
        assert_eq!(v.shape(), (2, 1));
        assert_eq!(v.transpose().shape(), (1, 2));
        assert_eq!(v.transpose().transpose().shape(), (2, 1));
    }
}
