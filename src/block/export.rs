//! Flatten a block grid into single-process artifacts: a dense gathered
//! right-hand-side vector, or one coordinate-format record with
//! block-offset bookkeeping for the file writer.

use log::debug;
use num_complex::Complex64;

use crate::block::cell::MatrixBlock;
use crate::block::matrix::BlockMatrix;
use crate::error::BlockError;
use crate::parallel::Comm;

/// Flat coordinate-format record handed to the writer verbatim.
#[derive(Clone, Debug)]
pub struct GlobalCoo {
    pub shape: (usize, usize),
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub data: Vec<Complex64>,
    pub complex: bool,
}

impl BlockMatrix {
    /// Concatenate the single column of vector-valued blocks into one
    /// dense array. Partitioned blocks are reassembled across ranks;
    /// local column blocks concatenate directly.
    pub fn gather_densevec(&self, comm: &dyn Comm) -> Result<Vec<Complex64>, BlockError> {
        let mut out = Vec::new();
        for i in 0..self.shape().0 {
            match self.get(i, 0) {
                Some(MatrixBlock::Sparse(m)) => out.extend(m.dense_column()?),
                Some(MatrixBlock::DistVec(v)) => out.extend(v.global_vector(comm)),
                Some(_) => {
                    return Err(BlockError::UnsupportedBlock(
                        "non-vector block in right-hand-side column",
                    ));
                }
                None => {
                    return Err(BlockError::UnsupportedBlock(
                        "empty cell in right-hand-side column",
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Flatten into one coordinate record. Offsets are prefix sums of the
    /// first nonempty block's shape per block-row/column; a block-row or
    /// block-column with no cells contributes zero. Each cell's triples
    /// are shifted by its block offsets.
    pub fn global_coo(&self, comm: &dyn Comm) -> Result<GlobalCoo, BlockError> {
        let (nr, nc) = self.shape();
        let mut row_offsets = vec![0usize; nr + 1];
        for i in 0..nr {
            let height = (0..nc)
                .find_map(|j| self.get(i, j).map(|b| b.shape().0))
                .unwrap_or(0);
            row_offsets[i + 1] = row_offsets[i] + height;
        }
        let mut col_offsets = vec![0usize; nc + 1];
        for j in 0..nc {
            let width = (0..nr)
                .find_map(|i| self.get(i, j).map(|b| b.shape().1))
                .unwrap_or(0);
            col_offsets[j + 1] = col_offsets[j] + width;
        }
        debug!("row offsets {row_offsets:?}, col offsets {col_offsets:?}");

        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut data = Vec::new();
        for i in 0..nr {
            for j in 0..nc {
                let Some(cell) = self.get(i, j) else { continue };
                let (cr, cc, cd) = cell.global_coo(comm)?;
                rows.extend(cr.into_iter().map(|r| r + row_offsets[i]));
                cols.extend(cc.into_iter().map(|c| c + col_offsets[j]));
                data.extend(cd);
            }
        }
        Ok(GlobalCoo {
            shape: (row_offsets[nr], col_offsets[nc]),
            rows,
            cols,
            data,
            complex: self.is_complex(),
        })
    }
}
