//! Block-structured matrix: an R×C grid of optional cells over named
//! physical-field blocks.
//!
//! The grid's shape and storage kind are fixed at construction; cells are
//! assigned through the canonical conversion boundary (`Into<MatrixBlock>`)
//! and combined by immutable, allocating operations. The complex flag is
//! monotone: once any assigned cell carries complex values it stays set.

use crate::block::cell::MatrixBlock;
use crate::error::BlockError;
use crate::parallel::Comm;

/// Whether cells live in one process or are partitioned across ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Distributed,
}

#[derive(Clone, Debug)]
pub struct BlockMatrix {
    shape: (usize, usize),
    kind: StorageKind,
    complex: bool,
    cells: Vec<Option<MatrixBlock>>,
}

impl BlockMatrix {
    /// Empty grid of the given shape and kind.
    pub fn new(shape: (usize, usize), kind: StorageKind) -> Self {
        BlockMatrix {
            shape,
            kind,
            complex: false,
            cells: vec![None; shape.0 * shape.1],
        }
    }

    pub fn local(shape: (usize, usize)) -> Self {
        Self::new(shape, StorageKind::Local)
    }

    pub fn distributed(shape: (usize, usize)) -> Self {
        Self::new(shape, StorageKind::Distributed)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn is_complex(&self) -> bool {
        self.complex
    }

    fn idx(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.shape.0 && j < self.shape.1,
            "block index ({i}, {j}) outside grid {:?}",
            self.shape
        );
        i * self.shape.1 + j
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&MatrixBlock> {
        self.cells[self.idx(i, j)].as_ref()
    }

    /// Assign a cell through the canonical conversion boundary. A local
    /// grid refuses partitioned variants.
    pub fn set(
        &mut self,
        i: usize,
        j: usize,
        value: impl Into<MatrixBlock>,
    ) -> Result<(), BlockError> {
        let block = value.into();
        if self.kind == StorageKind::Local && block.is_distributed() {
            return Err(BlockError::UnsupportedBlock(
                "partitioned block assigned into a local grid",
            ));
        }
        if block.is_complex() {
            self.complex = true;
        }
        let at = self.idx(i, j);
        self.cells[at] = Some(block);
        Ok(())
    }

    /// Drop a cell's contents, freeing the block.
    pub fn unset(&mut self, i: usize, j: usize) {
        let at = self.idx(i, j);
        self.cells[at] = None;
    }

    /// Set the cell if empty, otherwise accumulate into it.
    pub fn add_to_element(
        &mut self,
        i: usize,
        j: usize,
        value: impl Into<MatrixBlock>,
    ) -> Result<(), BlockError> {
        let block = value.into();
        match self.get(i, j) {
            None => self.set(i, j, block),
            Some(existing) => {
                let sum = existing.add(&block)?;
                self.set(i, j, sum)
            }
        }
    }

    /// Sub-grid holding the listed block-rows, cells cloned.
    pub fn select_block_rows(&self, rows: &[usize]) -> Result<BlockMatrix, BlockError> {
        let mut ret = BlockMatrix::new((rows.len(), self.shape.1), self.kind);
        for (ni, &i) in rows.iter().enumerate() {
            if i >= self.shape.0 {
                return Err(BlockError::IndexOutOfRange {
                    index: i,
                    bound: self.shape.0,
                });
            }
            for j in 0..self.shape.1 {
                if let Some(b) = self.get(i, j) {
                    ret.set(ni, j, b.clone())?;
                }
            }
        }
        Ok(ret)
    }

    /// Sub-grid holding the listed block-columns, cells cloned.
    pub fn select_block_cols(&self, cols: &[usize]) -> Result<BlockMatrix, BlockError> {
        let mut ret = BlockMatrix::new((self.shape.0, cols.len()), self.kind);
        for i in 0..self.shape.0 {
            for (nj, &j) in cols.iter().enumerate() {
                if j >= self.shape.1 {
                    return Err(BlockError::IndexOutOfRange {
                        index: j,
                        bound: self.shape.1,
                    });
                }
                if let Some(b) = self.get(i, j) {
                    ret.set(i, nj, b.clone())?;
                }
            }
        }
        Ok(ret)
    }

    fn check_shape(&self, other: &BlockMatrix) -> Result<(), BlockError> {
        if self.shape != other.shape {
            return Err(BlockError::ShapeMismatch {
                expected: self.shape,
                found: other.shape,
            });
        }
        Ok(())
    }

    /// Cell-wise sum; an empty cell is the additive identity.
    pub fn add(&self, other: &BlockMatrix) -> Result<BlockMatrix, BlockError> {
        self.check_shape(other)?;
        let mut ret = BlockMatrix::new(self.shape, self.kind);
        for i in 0..self.shape.0 {
            for j in 0..self.shape.1 {
                match (self.get(i, j), other.get(i, j)) {
                    (None, None) => {}
                    (None, Some(b)) => ret.set(i, j, b.clone())?,
                    (Some(a), None) => ret.set(i, j, a.clone())?,
                    (Some(a), Some(b)) => ret.set(i, j, a.add(b)?)?,
                }
            }
        }
        Ok(ret)
    }

    /// Cell-wise difference; `None - B` negates `B`.
    pub fn sub(&self, other: &BlockMatrix) -> Result<BlockMatrix, BlockError> {
        self.check_shape(other)?;
        let mut ret = BlockMatrix::new(self.shape, self.kind);
        for i in 0..self.shape.0 {
            for j in 0..self.shape.1 {
                match (self.get(i, j), other.get(i, j)) {
                    (None, None) => {}
                    (None, Some(b)) => ret.set(i, j, b.neg()?)?,
                    (Some(a), None) => ret.set(i, j, a.clone())?,
                    (Some(a), Some(b)) => ret.set(i, j, a.sub(b)?)?,
                }
            }
        }
        Ok(ret)
    }

    /// Grid transpose: cell `(i, j)` lands at `(j, i)` transposed; empty
    /// cells stay empty.
    pub fn transpose(&self, comm: &dyn Comm) -> Result<BlockMatrix, BlockError> {
        let mut ret = BlockMatrix::new((self.shape.1, self.shape.0), self.kind);
        for i in 0..self.shape.0 {
            for j in 0..self.shape.1 {
                if let Some(b) = self.get(i, j) {
                    ret.set(j, i, b.transpose(comm)?)?;
                }
            }
        }
        Ok(ret)
    }

    /// Block product: `ret[i, j] = Σ_k self[i, k] · other[k, j]`, skipping
    /// terms where either side is empty.
    pub fn dot(&self, other: &BlockMatrix, comm: &dyn Comm) -> Result<BlockMatrix, BlockError> {
        if self.shape.1 != other.shape.0 {
            return Err(BlockError::ShapeMismatch {
                expected: (self.shape.1, other.shape.1),
                found: other.shape,
            });
        }
        let shape = (self.shape.0, other.shape.1);
        let mut ret = BlockMatrix::new(shape, self.kind);
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                for k in 0..self.shape.1 {
                    let (Some(a), Some(b)) = (self.get(i, k), other.get(k, j)) else {
                        continue;
                    };
                    let term = a.dot(b, comm)?;
                    match ret.get(i, j) {
                        None => ret.set(i, j, term)?,
                        Some(acc) => {
                            let sum = acc.add(&term)?;
                            ret.set(i, j, sum)?;
                        }
                    }
                }
            }
        }
        Ok(ret)
    }

    /// Per-block-row report of raw stored-entry counts.
    pub fn format_nnz(&self) -> String {
        let mut txt = vec!["non-zero elements (nnz)".to_string()];
        for i in 0..self.shape.0 {
            let counts: Vec<String> = (0..self.shape.1)
                .map(|j| match self.get(i, j) {
                    Some(b) => b.nnz().to_string(),
                    None => "unknown".to_string(),
                })
                .collect();
            txt.push(format!("{i} : {}", counts.join(",  ")));
        }
        txt.join("\n")
    }

    /// Per-block-row report of compacted nonzero counts.
    pub fn format_true_nnz(&self) -> String {
        let mut txt = vec!["non-zero elements (true nnz)".to_string()];
        for i in 0..self.shape.0 {
            let counts: Vec<String> = (0..self.shape.1)
                .map(|j| match self.get(i, j) {
                    Some(b) => b.true_nnz().to_string(),
                    None => "unknown".to_string(),
                })
                .collect();
            txt.push(format!("{i} : {}", counts.join(",  ")));
        }
        txt.join("\n")
    }
}

impl std::fmt::Display for BlockMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BlockMatrix{:?}", self.shape)?;
        for i in 0..self.shape.0 {
            let row: Vec<String> = (0..self.shape.1)
                .map(|j| match self.get(i, j) {
                    Some(b) => b.to_string(),
                    None => "None".to_string(),
                })
                .collect();
            writeln!(f, "{i} : {}", row.join("  "))?;
        }
        Ok(())
    }
}
