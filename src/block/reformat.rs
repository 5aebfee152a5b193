//! Reformat a centrally held solution vector back into block form.
//!
//! The external solver hands back one flat dense vector on the
//! coordinating rank; this module slices it along the column partitioning
//! of a block-diagonal reference matrix and redistributes the segments to
//! their owning ranks.

use num_complex::Complex64;

use crate::block::matrix::{BlockMatrix, StorageKind};
use crate::error::BlockError;
use crate::matrix::coo::CooMatrix;
use crate::matrix::dist::DistVector;
use crate::parallel::Comm;

impl BlockMatrix {
    /// Slice `central` (present on rank 0 only; other ranks pass `None`)
    /// into per-block segments sized by this reference matrix's diagonal
    /// column counts, and return the column grid of reassigned blocks.
    ///
    /// For a distributed reference every segment is broadcast, and each
    /// rank keeps the sub-range its diagonal block's column partition
    /// owns. Non-coordinating ranks must still reach the broadcast.
    pub fn reformat_central_vec(
        &self,
        central: Option<&[Complex64]>,
        comm: &dyn Comm,
    ) -> Result<BlockMatrix, BlockError> {
        let ncols = self.shape().1;
        let mut ret = BlockMatrix::new((ncols, 1), self.kind());
        let mut offset = 0;
        for i in 0..ncols {
            let diag = self.get(i, i).ok_or(BlockError::UnsupportedBlock(
                "reference matrix is missing a diagonal block",
            ))?;
            let len = diag.shape().1;
            let segment = match central {
                Some(v) => {
                    if v.len() < offset + len {
                        return Err(BlockError::IndexOutOfRange {
                            index: offset + len,
                            bound: v.len(),
                        });
                    }
                    Some(&v[offset..offset + len])
                }
                None => None,
            };
            offset += len;

            match self.kind() {
                StorageKind::Local => {
                    let seg = segment.ok_or_else(|| {
                        BlockError::CollectiveFailure(
                            "central vector absent on the coordinating process".into(),
                        )
                    })?;
                    ret.set(i, 0, column_block(seg))?;
                }
                StorageKind::Distributed => {
                    // Real and imaginary parts travel as separate
                    // broadcasts; only rank 0 supplies payloads.
                    let (re_in, im_in) = match segment {
                        Some(s) => (
                            Some(s.iter().map(|v| v.re).collect::<Vec<_>>()),
                            Some(s.iter().map(|v| v.im).collect::<Vec<_>>()),
                        ),
                        None => (None, None),
                    };
                    let re = comm.broadcast_f64(re_in.as_deref(), 0)?;
                    let im = comm.broadcast_f64(im_in.as_deref(), 0)?;
                    let complex = im.iter().any(|&v| v != 0.0);
                    match diag.col_partition() {
                        Some(part) => {
                            let data: Vec<Complex64> = (part.start..part.end)
                                .map(|k| Complex64::new(re[k], im[k]))
                                .collect();
                            ret.set(i, 0, DistVector::from_slice(len, part, data, complex)?)?;
                        }
                        None => {
                            // Unpartitioned reference: every rank keeps
                            // the full segment as a dense column.
                            let full: Vec<Complex64> = re
                                .iter()
                                .zip(&im)
                                .map(|(&re, &im)| Complex64::new(re, im))
                                .collect();
                            ret.set(i, 0, column_block(&full))?;
                        }
                    }
                }
            }
        }
        Ok(ret)
    }
}

fn column_block(segment: &[Complex64]) -> CooMatrix {
    if segment.iter().any(|v| v.im != 0.0) {
        CooMatrix::from_column_complex(segment)
    } else {
        let re: Vec<f64> = segment.iter().map(|v| v.re).collect();
        CooMatrix::from_column(&re)
    }
}
