/// MPI-based communication context.
///
/// Wraps the MPI world communicator and implements the `Comm` collectives
/// on top of it: broadcast via `broadcast_into` from the root process, and
/// the rank-ordered all-gathers via a count exchange followed by a
/// variable-count gather. Only compiled when the `mpi` feature is enabled.
///
/// A rank that fails before reaching a collective leaves its peers blocked
/// in that call; nothing here recovers from that.
use mpi::Count;
use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::BlockError;

/// MPI communicator wrapper for distributed block storage.
pub struct MpiComm {
    /// Keeps the MPI environment alive for the lifetime of the context.
    _universe: Universe,
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// # Panics
    /// Panics if MPI initialization fails.
    pub fn new() -> Self {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm {
            _universe: universe,
            world,
            rank,
            size,
        }
    }

    fn gather_varcount<T: Clone + Default + mpi::datatype::Equivalence>(
        &self,
        local: &[T],
    ) -> Vec<T> {
        let mut counts = vec![0 as Count; self.size];
        self.world
            .all_gather_into(&(local.len() as Count), &mut counts[..]);
        let displs: Vec<Count> = counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect();
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let mut buf = vec![T::default(); total];
        {
            let mut partition = PartitionMut::new(&mut buf[..], counts, displs);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        buf
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) {
        self.world.barrier();
    }

    /// Broadcasts a buffer from `root` to every rank. The length travels
    /// first so that non-root ranks can size their receive buffer.
    fn broadcast_f64(&self, data: Option<&[f64]>, root: usize) -> Result<Vec<f64>, BlockError> {
        let root_proc = self.world.process_at_rank(root as i32);
        let mut len = 0u64;
        if self.rank == root {
            len = data
                .ok_or_else(|| {
                    BlockError::CollectiveFailure("broadcast root supplied no data".into())
                })?
                .len() as u64;
        }
        root_proc.broadcast_into(&mut len);
        let mut buf = vec![0.0f64; len as usize];
        if self.rank == root {
            if let Some(d) = data {
                buf.copy_from_slice(d);
            }
        }
        root_proc.broadcast_into(&mut buf[..]);
        Ok(buf)
    }

    fn all_gather_u64(&self, local: &[u64]) -> Vec<u64> {
        self.gather_varcount(local)
    }

    fn all_gather_f64(&self, local: &[f64]) -> Vec<f64> {
        self.gather_varcount(local)
    }
}
