//! Matrix module: local coordinate-format and distributed sparse storage.

pub mod coo;
pub use coo::CooMatrix;
pub mod dist;
pub use dist::{DistMatrix, DistVector, Partition};
