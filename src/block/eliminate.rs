//! Structurally-empty row/column elimination.
//!
//! Per block-row, the engine discovers row indices with at least one
//! structural nonzero in any block-column, reconciles the index sets
//! across ranks for distributed grids, and builds the reduced matrix plus
//! the block-diagonal injection matrix mapping the survivor space back to
//! the original unknowns.

use std::collections::BTreeSet;

use log::{debug, trace};

use crate::block::cell::{IdentityBlock, MatrixBlock};
use crate::block::matrix::{BlockMatrix, StorageKind};
use crate::error::BlockError;
use crate::parallel::Comm;

impl BlockMatrix {
    /// Strip structurally all-zero rows and columns.
    ///
    /// Returns `(ret, p2)`: the reduced grid and a block-diagonal grid of
    /// selectors. A diagonal `p2` cell is the 0/1 elimination matrix when
    /// the block-row lost indices, the implicit identity when nothing was
    /// eliminated, and empty when the block-row held no matrix cell at
    /// all. A block-row with no nonempty cells contributes an empty
    /// survivor set.
    ///
    /// Row-wise and column-wise zero sets are assumed identical for a
    /// square diagonal block; the survivor set derived from rows is
    /// applied in both directions.
    pub fn eliminate_empty_rowcol(
        &self,
        comm: &dyn Comm,
    ) -> Result<(BlockMatrix, BlockMatrix), BlockError> {
        let (nr, nc) = self.shape();
        if nr != nc {
            return Err(BlockError::ShapeMismatch {
                expected: (nr, nr),
                found: (nr, nc),
            });
        }
        let mut ret = BlockMatrix::new(self.shape(), self.kind());
        let mut p2 = BlockMatrix::new(self.shape(), self.kind());

        debug!("{}", self.format_true_nnz());

        for i in 0..nr {
            // Local, per-block-row discovery; no communication yet.
            let mut local: BTreeSet<usize> = BTreeSet::new();
            let mut has_matrix_cell = false;
            for j in 0..nc {
                match self.get(i, j) {
                    None => {}
                    Some(MatrixBlock::Sparse(m)) => {
                        local.extend(m.nonzero_rows());
                        has_matrix_cell = true;
                    }
                    Some(MatrixBlock::DistSparse(m)) => {
                        local.extend(m.nonzero_local_rows());
                        has_matrix_cell = true;
                    }
                    Some(MatrixBlock::DistVec(v)) => {
                        // A vector degenerates to index 0 unless provably
                        // all-zero.
                        if !v.is_all_zero(comm) {
                            local.insert(0);
                        }
                    }
                    Some(MatrixBlock::Identity(_)) => {
                        local.insert(0);
                    }
                }
            }

            let survivors: Vec<usize> = match self.kind() {
                StorageKind::Local => local.into_iter().collect(),
                StorageKind::Distributed => {
                    // Translate to global indices using the diagonal
                    // block's row offset, then agree across ranks.
                    let offset = match self.get(i, i) {
                        Some(MatrixBlock::DistSparse(m)) => m.row_partition().start,
                        _ => 0,
                    };
                    let shifted: Vec<usize> = local.into_iter().map(|k| k + offset).collect();
                    comm.all_gather_dedup(&shifted)
                }
            };
            trace!("block-row {i}: {} surviving indices", survivors.len());

            if has_matrix_cell {
                if let Some(diag) = self.get(i, i) {
                    if survivors.len() < diag.shape().0 {
                        p2.set(i, i, diag.elimination_matrix(&survivors)?)?;
                    } else {
                        p2.set(i, i, IdentityBlock::from_ref(diag))?;
                    }
                }
            }

            // Restrict rows of block-row i and columns of block-column i,
            // reading back previously restricted cells so both passes
            // compose on the diagonal.
            for j in 0..nc {
                let row_restricted = match ret.get(i, j).or_else(|| self.get(i, j)) {
                    Some(b) => Some(b.select_rows(&survivors)?),
                    None => None,
                };
                if let Some(b) = row_restricted {
                    ret.set(i, j, b)?;
                }
                let col_restricted = match ret.get(j, i).or_else(|| self.get(j, i)) {
                    Some(b) => Some(b.select_cols(&survivors)?),
                    None => None,
                };
                if let Some(b) = col_restricted {
                    ret.set(j, i, b)?;
                }
            }
        }
        Ok((ret, p2))
    }
}
