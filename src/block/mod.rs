//! Block grid, cell variants, and the algorithms operating on them.

pub mod cell;
pub use cell::{IdentityBlock, MatrixBlock};
pub mod matrix;
pub use matrix::{BlockMatrix, StorageKind};
pub mod eliminate;
pub mod export;
pub use export::GlobalCoo;
pub mod reformat;
