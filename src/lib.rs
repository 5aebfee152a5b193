//! blocksys: block-structured sparse matrix algebra for multi-field
//! linear systems.
//!
//! This crate assembles, transforms, and harvests results from a large
//! linear system partitioned into named physical-field blocks. Each block
//! may be a single-process sparse matrix or a row/column-partitioned
//! matrix distributed across cooperating processes, behind one uniform
//! cell interface. On top of the grid sit the empty row/column
//! elimination step, the central-vector reformatter, and the global
//! coordinate exporter.

pub mod parallel;

pub mod block;
pub mod error;
pub mod matrix;

// Re-exports for convenience
pub use block::*;
pub use error::*;
pub use matrix::*;
pub use parallel::*;
