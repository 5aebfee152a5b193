//! Tests for the global coordinate exporter, the dense right-hand-side
//! gather, and the central-vector reformatter on local grids.

use approx::assert_abs_diff_eq;
use blocksys::matrix::coo::CooMatrix;
use blocksys::parallel::SerialComm;
use blocksys::{BlockMatrix, MatrixBlock};
use num_complex::Complex64;

fn sparse(block: &MatrixBlock) -> &CooMatrix {
    match block {
        MatrixBlock::Sparse(m) => m,
        other => panic!("expected a local sparse block, got {other}"),
    }
}

#[test]
fn coordinate_export_shifts_by_block_offsets() {
    let comm = SerialComm;
    let mut m = BlockMatrix::local((2, 2));
    m.set(
        0,
        0,
        CooMatrix::from_triplets(3, 3, vec![0, 1, 2], vec![0, 1, 2], vec![1.0, 2.0, 3.0]).unwrap(),
    )
    .unwrap();
    m.set(
        1,
        1,
        CooMatrix::from_triplets(2, 2, vec![0, 1], vec![1, 0], vec![8.0, 9.0]).unwrap(),
    )
    .unwrap();

    let coo = m.global_coo(&comm).unwrap();
    assert_eq!(coo.shape, (5, 5));
    assert!(!coo.complex);
    // Every triple from block (1,1) is shifted by (3, 3).
    let mut found = false;
    for ((&r, &c), &v) in coo.rows.iter().zip(&coo.cols).zip(&coo.data) {
        if v.re == 8.0 {
            assert_eq!((r, c), (3, 4));
            found = true;
        }
        if v.re == 9.0 {
            assert_eq!((r, c), (4, 3));
        }
        if r < 3 {
            assert!(c < 3, "block (0,0) entry leaked into foreign columns");
        }
    }
    assert!(found);
}

#[test]
fn empty_block_row_contributes_no_offset() {
    let comm = SerialComm;
    let mut m = BlockMatrix::local((2, 2));
    m.set(
        0,
        0,
        CooMatrix::from_triplets(3, 3, vec![2], vec![0], vec![1.0]).unwrap(),
    )
    .unwrap();
    let coo = m.global_coo(&comm).unwrap();
    assert_eq!(coo.shape, (3, 3));
    assert_eq!(coo.rows, vec![2]);
    assert_eq!(coo.cols, vec![0]);
}

#[test]
fn reformat_central_vector_on_local_grid() {
    let comm = SerialComm;
    // Reference block-diagonal matrix with column counts [2, 3].
    let mut reference = BlockMatrix::local((2, 2));
    reference.set(0, 0, CooMatrix::zeros(2, 2)).unwrap();
    reference.set(1, 1, CooMatrix::zeros(3, 3)).unwrap();

    let central: Vec<Complex64> = [10.0, 20.0, 30.0, 40.0, 50.0]
        .iter()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    let cols = reference
        .reformat_central_vec(Some(&central), &comm)
        .unwrap();

    assert_eq!(cols.shape(), (2, 1));
    let first = sparse(cols.get(0, 0).unwrap());
    assert_eq!(first.shape(), (2, 1));
    assert_abs_diff_eq!(first.value_at(0, 0).re, 10.0, epsilon = 1e-14);
    assert_abs_diff_eq!(first.value_at(1, 0).re, 20.0, epsilon = 1e-14);
    let second = sparse(cols.get(1, 0).unwrap());
    assert_eq!(second.shape(), (3, 1));
    assert_abs_diff_eq!(second.value_at(0, 0).re, 30.0, epsilon = 1e-14);
    assert_abs_diff_eq!(second.value_at(2, 0).re, 50.0, epsilon = 1e-14);
}

#[test]
fn reformat_flags_complex_segments() {
    let comm = SerialComm;
    let mut reference = BlockMatrix::local((1, 1));
    reference.set(0, 0, CooMatrix::zeros(2, 2)).unwrap();
    let central = vec![Complex64::new(1.0, 0.5), Complex64::new(2.0, 0.0)];
    let cols = reference
        .reformat_central_vec(Some(&central), &comm)
        .unwrap();
    assert!(cols.is_complex());
    assert_eq!(
        sparse(cols.get(0, 0).unwrap()).value_at(0, 0),
        Complex64::new(1.0, 0.5)
    );
}

#[test]
fn reformat_rejects_short_central_vector() {
    let comm = SerialComm;
    let mut reference = BlockMatrix::local((1, 1));
    reference.set(0, 0, CooMatrix::zeros(4, 4)).unwrap();
    let central = vec![Complex64::new(1.0, 0.0); 2];
    assert!(matches!(
        reference.reformat_central_vec(Some(&central), &comm),
        Err(blocksys::BlockError::IndexOutOfRange { .. })
    ));
}

#[test]
fn gather_densevec_concatenates_column_blocks() {
    let comm = SerialComm;
    let mut rhs = BlockMatrix::local((2, 1));
    rhs.set(0, 0, CooMatrix::from_column(&[1.0, 0.0, 2.0]))
        .unwrap();
    rhs.set(1, 0, CooMatrix::from_column(&[3.0, 4.0])).unwrap();

    let dense = rhs.gather_densevec(&comm).unwrap();
    let values: Vec<f64> = dense.iter().map(|v| v.re).collect();
    assert_eq!(values, vec![1.0, 0.0, 2.0, 3.0, 4.0]);
}

#[test]
fn gather_densevec_rejects_matrix_cells() {
    let comm = SerialComm;
    let mut rhs = BlockMatrix::local((1, 1));
    rhs.set(0, 0, CooMatrix::zeros(2, 2)).unwrap();
    // a (2, 2) block is not a column
    assert!(matches!(
        rhs.gather_densevec(&comm),
        Err(blocksys::BlockError::ShapeMismatch { .. })
    ));
}
