//! Polymorphic block cell: one closed variant type behind the shared
//! capability set (shape, nnz, transpose, product, selection, selector
//! construction, global-coordinate export). Dispatch is a `match` on the
//! tag; the grid never inspects concrete types beyond this enum.

use faer::Mat;
use num_complex::Complex64;

use crate::error::BlockError;
use crate::matrix::coo::CooMatrix;
use crate::matrix::dist::{DistMatrix, DistVector, Partition};
use crate::parallel::Comm;

/// Implicit identity operator sized from a reference block; partitions are
/// copied from the reference when it is distributed. Carries no
/// coefficient storage.
#[derive(Clone, Debug)]
pub struct IdentityBlock {
    shape: (usize, usize),
    row_part: Option<Partition>,
    col_part: Option<Partition>,
}

impl IdentityBlock {
    pub fn from_ref(reference: &MatrixBlock) -> Self {
        IdentityBlock {
            shape: reference.shape(),
            row_part: reference.row_partition(),
            col_part: reference.col_partition(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn row_partition(&self) -> Option<Partition> {
        self.row_part
    }

    pub fn col_partition(&self) -> Option<Partition> {
        self.col_part
    }
}

#[derive(Clone, Debug)]
pub enum MatrixBlock {
    Identity(IdentityBlock),
    Sparse(CooMatrix),
    DistSparse(DistMatrix),
    DistVec(DistVector),
}

// Partitioned 0/1 selector: P[k, keep[k]] = 1 with rows owned per the
// restricted partition. Used when selecting rows of a partitioned
// identity.
fn dist_selector(n: usize, part: Partition, keep: &[usize]) -> Result<DistMatrix, BlockError> {
    let new_part = part.restrict(keep);
    let mut row = Vec::new();
    let mut col = Vec::new();
    let mut data = Vec::new();
    for k in new_part.start..new_part.end {
        row.push(k - new_part.start);
        col.push(keep[k]);
        data.push(1.0);
    }
    let local = CooMatrix::from_triplets(new_part.len(), n, row, col, data)?;
    DistMatrix::from_local(keep.len(), n, new_part, part, local)
}

impl MatrixBlock {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            MatrixBlock::Identity(b) => b.shape(),
            MatrixBlock::Sparse(m) => m.shape(),
            MatrixBlock::DistSparse(m) => m.shape(),
            MatrixBlock::DistVec(v) => v.shape(),
        }
    }

    /// Raw stored-entry count (locally stored entries for distributed
    /// variants).
    pub fn nnz(&self) -> usize {
        match self {
            MatrixBlock::Identity(b) => b.shape().0,
            MatrixBlock::Sparse(m) => m.nnz(),
            MatrixBlock::DistSparse(m) => m.nnz(),
            MatrixBlock::DistVec(v) => v.nnz(),
        }
    }

    /// Structural nonzero count after compaction.
    pub fn true_nnz(&self) -> usize {
        match self {
            MatrixBlock::Identity(b) => b.shape().0,
            MatrixBlock::Sparse(m) => m.true_nnz(),
            MatrixBlock::DistSparse(m) => m.true_nnz(),
            MatrixBlock::DistVec(v) => v.nnz(),
        }
    }

    pub fn is_complex(&self) -> bool {
        match self {
            MatrixBlock::Identity(_) => false,
            MatrixBlock::Sparse(m) => m.is_complex(),
            MatrixBlock::DistSparse(m) => m.is_complex(),
            MatrixBlock::DistVec(v) => v.is_complex(),
        }
    }

    /// True for variants carrying a partition, i.e. ones only legal in a
    /// distributed-kind grid.
    pub fn is_distributed(&self) -> bool {
        match self {
            MatrixBlock::Identity(b) => b.row_part.is_some() || b.col_part.is_some(),
            MatrixBlock::Sparse(_) => false,
            MatrixBlock::DistSparse(_) | MatrixBlock::DistVec(_) => true,
        }
    }

    pub fn row_partition(&self) -> Option<Partition> {
        match self {
            MatrixBlock::Identity(b) => b.row_part,
            MatrixBlock::Sparse(_) => None,
            MatrixBlock::DistSparse(m) => Some(m.row_partition()),
            MatrixBlock::DistVec(v) => Some(v.partition()),
        }
    }

    pub fn col_partition(&self) -> Option<Partition> {
        match self {
            MatrixBlock::Identity(b) => b.col_part,
            MatrixBlock::Sparse(_) => None,
            MatrixBlock::DistSparse(m) => Some(m.col_partition()),
            MatrixBlock::DistVec(_) => None,
        }
    }

    pub fn transpose(&self, comm: &dyn Comm) -> Result<MatrixBlock, BlockError> {
        Ok(match self {
            MatrixBlock::Identity(_) => self.clone(),
            MatrixBlock::Sparse(m) => MatrixBlock::Sparse(m.transpose()),
            MatrixBlock::DistSparse(m) => MatrixBlock::DistSparse(m.transpose(comm)?),
            MatrixBlock::DistVec(v) => MatrixBlock::DistVec(v.transpose()),
        })
    }

    pub fn conj_transpose(&self, comm: &dyn Comm) -> Result<MatrixBlock, BlockError> {
        Ok(match self {
            MatrixBlock::Identity(_) => self.clone(),
            MatrixBlock::Sparse(m) => MatrixBlock::Sparse(m.conj_transpose()),
            MatrixBlock::DistSparse(m) => MatrixBlock::DistSparse(m.conj_transpose(comm)?),
            MatrixBlock::DistVec(v) => MatrixBlock::DistVec(v.transpose()),
        })
    }

    pub fn add(&self, other: &MatrixBlock) -> Result<MatrixBlock, BlockError> {
        match (self, other) {
            (MatrixBlock::Sparse(a), MatrixBlock::Sparse(b)) => Ok(MatrixBlock::Sparse(a.add(b)?)),
            (MatrixBlock::DistSparse(a), MatrixBlock::DistSparse(b)) => {
                Ok(MatrixBlock::DistSparse(a.add(b)?))
            }
            (MatrixBlock::DistVec(a), MatrixBlock::DistVec(b)) => {
                Ok(MatrixBlock::DistVec(a.add(b)?))
            }
            _ => Err(BlockError::UnsupportedBlock(
                "mismatched block variants in add",
            )),
        }
    }

    pub fn sub(&self, other: &MatrixBlock) -> Result<MatrixBlock, BlockError> {
        match (self, other) {
            (MatrixBlock::Sparse(a), MatrixBlock::Sparse(b)) => Ok(MatrixBlock::Sparse(a.sub(b)?)),
            (MatrixBlock::DistSparse(a), MatrixBlock::DistSparse(b)) => {
                Ok(MatrixBlock::DistSparse(a.sub(b)?))
            }
            (MatrixBlock::DistVec(a), MatrixBlock::DistVec(b)) => {
                Ok(MatrixBlock::DistVec(a.sub(b)?))
            }
            _ => Err(BlockError::UnsupportedBlock(
                "mismatched block variants in subtract",
            )),
        }
    }

    pub fn neg(&self) -> Result<MatrixBlock, BlockError> {
        match self {
            MatrixBlock::Identity(_) => Err(BlockError::UnsupportedBlock(
                "negation of an identity block",
            )),
            MatrixBlock::Sparse(m) => Ok(MatrixBlock::Sparse(m.neg())),
            MatrixBlock::DistSparse(m) => Ok(MatrixBlock::DistSparse(m.neg())),
            MatrixBlock::DistVec(v) => Ok(MatrixBlock::DistVec(v.neg())),
        }
    }

    /// Block product. An identity on either side is a no-op returning the
    /// other operand.
    pub fn dot(&self, other: &MatrixBlock, comm: &dyn Comm) -> Result<MatrixBlock, BlockError> {
        match (self, other) {
            (MatrixBlock::Identity(_), _) => Ok(other.clone()),
            (_, MatrixBlock::Identity(_)) => Ok(self.clone()),
            (MatrixBlock::Sparse(a), MatrixBlock::Sparse(b)) => Ok(MatrixBlock::Sparse(a.dot(b)?)),
            (MatrixBlock::DistSparse(a), MatrixBlock::DistSparse(b)) => {
                Ok(MatrixBlock::DistSparse(a.dot(b, comm)?))
            }
            (MatrixBlock::DistSparse(a), MatrixBlock::DistVec(v)) => {
                Ok(MatrixBlock::DistVec(a.dot_vec(v, comm)?))
            }
            _ => Err(BlockError::UnsupportedBlock(
                "unsupported block combination in dot",
            )),
        }
    }

    /// Restrict to the listed rows. Identity blocks materialize the
    /// corresponding 0/1 selector.
    pub fn select_rows(&self, keep: &[usize]) -> Result<MatrixBlock, BlockError> {
        match self {
            MatrixBlock::Identity(b) => match b.row_part {
                Some(part) => Ok(MatrixBlock::DistSparse(dist_selector(
                    b.shape.0, part, keep,
                )?)),
                None => Ok(MatrixBlock::Sparse(
                    CooMatrix::zeros(b.shape.0, b.shape.1).elimination_matrix(keep)?,
                )),
            },
            MatrixBlock::Sparse(m) => Ok(MatrixBlock::Sparse(m.select_rows(keep)?)),
            MatrixBlock::DistSparse(m) => Ok(MatrixBlock::DistSparse(m.select_rows(keep)?)),
            MatrixBlock::DistVec(v) => Ok(MatrixBlock::DistVec(v.select_rows(keep)?)),
        }
    }

    /// Restrict to the listed columns.
    pub fn select_cols(&self, keep: &[usize]) -> Result<MatrixBlock, BlockError> {
        match self {
            MatrixBlock::Identity(b) => match b.row_part {
                Some(part) => {
                    // Transposed selector: rows keep the reference's
                    // partition, the kept columns renumber.
                    let mut row = Vec::new();
                    let mut col = Vec::new();
                    let mut data = Vec::new();
                    for (k, &r) in keep.iter().enumerate() {
                        if r >= b.shape.0 {
                            return Err(BlockError::IndexOutOfRange {
                                index: r,
                                bound: b.shape.0,
                            });
                        }
                        if part.contains(r) {
                            row.push(r - part.start);
                            col.push(k);
                            data.push(1.0);
                        }
                    }
                    let local = CooMatrix::from_triplets(part.len(), keep.len(), row, col, data)?;
                    let col_part = b.col_part.unwrap_or(part).restrict(keep);
                    Ok(MatrixBlock::DistSparse(DistMatrix::from_local(
                        b.shape.0,
                        keep.len(),
                        part,
                        col_part,
                        local,
                    )?))
                }
                None => Ok(MatrixBlock::Sparse(
                    CooMatrix::zeros(b.shape.0, b.shape.1)
                        .elimination_matrix(keep)?
                        .transpose(),
                )),
            },
            MatrixBlock::Sparse(m) => Ok(MatrixBlock::Sparse(m.select_cols(keep)?)),
            MatrixBlock::DistSparse(m) => Ok(MatrixBlock::DistSparse(m.select_cols(keep)?)),
            MatrixBlock::DistVec(v) => Ok(MatrixBlock::DistVec(v.select_cols(keep)?)),
        }
    }

    /// 0/1 selector mapping the survivor space back to this block's row
    /// space, in this block's storage flavor.
    pub fn elimination_matrix(&self, keep: &[usize]) -> Result<MatrixBlock, BlockError> {
        match self {
            MatrixBlock::Identity(b) => match b.row_part {
                Some(part) => Ok(MatrixBlock::DistSparse(dist_selector(
                    b.shape.0, part, keep,
                )?)),
                None => Ok(MatrixBlock::Sparse(
                    CooMatrix::zeros(b.shape.0, b.shape.1).elimination_matrix(keep)?,
                )),
            },
            MatrixBlock::Sparse(m) => Ok(MatrixBlock::Sparse(m.elimination_matrix(keep)?)),
            MatrixBlock::DistSparse(m) => Ok(MatrixBlock::DistSparse(m.elimination_matrix(keep)?)),
            MatrixBlock::DistVec(_) => Err(BlockError::UnsupportedBlock(
                "elimination matrix from a vector block",
            )),
        }
    }

    /// Global-coordinate triples of this cell. Local blocks contribute on
    /// rank 0 only so an external merge sees each entry once; partitioned
    /// blocks contribute exactly their owned slice on each rank.
    pub fn global_coo(
        &self,
        comm: &dyn Comm,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<Complex64>), BlockError> {
        match self {
            MatrixBlock::Identity(b) => {
                let one = Complex64::new(1.0, 0.0);
                let range = match b.row_part {
                    Some(part) => part.start..part.end,
                    None if comm.rank() == 0 => 0..b.shape.0,
                    None => 0..0,
                };
                let idx: Vec<usize> = range.collect();
                let data = vec![one; idx.len()];
                Ok((idx.clone(), idx, data))
            }
            MatrixBlock::Sparse(m) => {
                if comm.rank() == 0 {
                    let compact = m.compacted();
                    let mut rows = Vec::new();
                    let mut cols = Vec::new();
                    let mut data = Vec::new();
                    for (r, c, v) in compact.triplets() {
                        rows.push(r);
                        cols.push(c);
                        data.push(v);
                    }
                    Ok((rows, cols, data))
                } else {
                    Ok((Vec::new(), Vec::new(), Vec::new()))
                }
            }
            MatrixBlock::DistSparse(m) => Ok(m.global_triplets()),
            MatrixBlock::DistVec(v) => {
                let part = v.partition();
                let column = v.shape().1 == 1;
                let mut rows = Vec::new();
                let mut cols = Vec::new();
                let mut data = Vec::new();
                for (i, &val) in v.local_data().iter().enumerate() {
                    if val != Complex64::new(0.0, 0.0) {
                        let g = part.start + i;
                        if column {
                            rows.push(g);
                            cols.push(0);
                        } else {
                            rows.push(0);
                            cols.push(g);
                        }
                        data.push(val);
                    }
                }
                Ok((rows, cols, data))
            }
        }
    }
}

impl From<CooMatrix> for MatrixBlock {
    fn from(m: CooMatrix) -> Self {
        MatrixBlock::Sparse(m)
    }
}

impl From<DistMatrix> for MatrixBlock {
    fn from(m: DistMatrix) -> Self {
        MatrixBlock::DistSparse(m)
    }
}

impl From<DistVector> for MatrixBlock {
    fn from(v: DistVector) -> Self {
        MatrixBlock::DistVec(v)
    }
}

impl From<IdentityBlock> for MatrixBlock {
    fn from(b: IdentityBlock) -> Self {
        MatrixBlock::Identity(b)
    }
}

/// Dense matrices convert in full to the canonical sparse form.
impl From<Mat<f64>> for MatrixBlock {
    fn from(m: Mat<f64>) -> Self {
        MatrixBlock::Sparse(CooMatrix::from_dense(&m))
    }
}

/// A bare vector converts as a dense column.
impl From<Vec<f64>> for MatrixBlock {
    fn from(v: Vec<f64>) -> Self {
        MatrixBlock::Sparse(CooMatrix::from_column(&v))
    }
}

impl std::fmt::Display for MatrixBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixBlock::Identity(b) => write!(f, "Identity{:?}", b.shape()),
            MatrixBlock::Sparse(m) => write!(f, "{m}"),
            MatrixBlock::DistSparse(m) => write!(f, "{m}"),
            MatrixBlock::DistVec(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_dot_is_noop() {
        let comm = crate::parallel::SerialComm;
        let m = CooMatrix::from_triplets(2, 2, vec![0, 1], vec![0, 1], vec![3.0, 4.0]).unwrap();
        let a = MatrixBlock::from(m.clone());
        let eye = MatrixBlock::Identity(IdentityBlock::from_ref(&a));
        let left = eye.dot(&a, &comm).unwrap();
        let right = a.dot(&eye, &comm).unwrap();
        match (&left, &right) {
            (MatrixBlock::Sparse(l), MatrixBlock::Sparse(r)) => {
                assert_eq!(l.compacted(), m.compacted());
                assert_eq!(r.compacted(), m.compacted());
            }
            _ => panic!("expected sparse results"),
        }
    }

    #[test]
    fn identity_select_rows_materializes_selector() {
        let a = MatrixBlock::from(CooMatrix::zeros(4, 4));
        let eye = MatrixBlock::Identity(IdentityBlock::from_ref(&a));
        let sel = eye.select_rows(&[0, 2]).unwrap();
        match sel {
            MatrixBlock::Sparse(p) => {
                assert_eq!(p.shape(), (2, 4));
                assert_abs_diff_eq!(p.value_at(0, 0).re, 1.0, epsilon = 1e-14);
                assert_abs_diff_eq!(p.value_at(1, 2).re, 1.0, epsilon = 1e-14);
            }
            _ => panic!("expected a local selector"),
        }
    }

    #[test]
    fn dense_conversion_is_canonical() {
        let dense = Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.0 });
        let block = MatrixBlock::from(dense);
        assert_eq!(block.shape(), (2, 2));
        assert_eq!(block.true_nnz(), 2);
        assert!(!block.is_distributed());
    }

    #[test]
    fn mismatched_variants_refuse_add() {
        let a = MatrixBlock::from(CooMatrix::zeros(2, 2));
        let v = MatrixBlock::from(
            DistVector::from_slice(
                2,
                Partition::full(2),
                vec![Complex64::new(0.0, 0.0); 2],
                false,
            )
            .unwrap(),
        );
        assert!(matches!(
            a.add(&v),
            Err(BlockError::UnsupportedBlock(_))
        ));
    }
}
