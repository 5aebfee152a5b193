//! Communication context for distributed block storage.
//!
//! Every operation that may touch a distributed block takes a `&dyn Comm`
//! explicitly; there is no ambient process registry. The two collective
//! primitives are a one-to-all broadcast and a rank-ordered all-gather
//! (plus the derived gather-and-deduplicate used by the elimination step).
//! Both are synchronous: every cooperating process must reach the same
//! call before any proceeds.

use crate::error::BlockError;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// One-to-all broadcast of a dense buffer. The root rank passes
    /// `Some(..)`; every rank receives the full buffer.
    fn broadcast_f64(&self, data: Option<&[f64]>, root: usize) -> Result<Vec<f64>, BlockError>;
    /// Concatenation of every rank's contribution, in rank order.
    fn all_gather_u64(&self, local: &[u64]) -> Vec<u64>;
    /// Concatenation of every rank's contribution, in rank order.
    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64>;
    /// Gather-and-deduplicate: the union of every rank's index set,
    /// sorted, identical on all ranks.
    fn all_gather_dedup(&self, local: &[usize]) -> Vec<usize> {
        let shifted: Vec<u64> = local.iter().map(|&i| i as u64).collect();
        let mut out: Vec<usize> = self
            .all_gather_u64(&shifted)
            .into_iter()
            .map(|i| i as usize)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Single-process context: rank 0 of 1. Every collective degenerates to
/// the identity, which makes the distributed code paths testable without
/// an MPI launcher.
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn broadcast_f64(&self, data: Option<&[f64]>, _root: usize) -> Result<Vec<f64>, BlockError> {
        data.map(<[f64]>::to_vec).ok_or_else(|| {
            BlockError::CollectiveFailure("broadcast root supplied no data".into())
        })
    }
    fn all_gather_u64(&self, local: &[u64]) -> Vec<u64> {
        local.to_vec()
    }
    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        local.to_vec()
    }
}

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_gather_dedup_sorts_and_dedups() {
        let comm = SerialComm;
        let out = comm.all_gather_dedup(&[5, 1, 3, 1, 5]);
        assert_eq!(out, vec![1, 3, 5]);
    }

    #[test]
    fn serial_broadcast_requires_root_data() {
        let comm = SerialComm;
        assert!(comm.broadcast_f64(None, 0).is_err());
        let out = comm.broadcast_f64(Some(&[1.0, 2.0]), 0).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
    }
}
