use thiserror::Error;

// Unified error type for blocksys

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("unsupported block element: {0}")]
    UnsupportedBlock(&'static str),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("collective operation failed: {0}")]
    CollectiveFailure(String),
    #[error("index {index} out of range (bound {bound})")]
    IndexOutOfRange { index: usize, bound: usize },
}
