//! Tests for empty row/column elimination: survivor discovery, injection
//! matrix construction, and idempotence on already-reduced systems.

use approx::assert_abs_diff_eq;
use blocksys::matrix::coo::CooMatrix;
use blocksys::parallel::SerialComm;
use blocksys::{BlockMatrix, MatrixBlock};

fn sparse(block: &MatrixBlock) -> &CooMatrix {
    match block {
        MatrixBlock::Sparse(m) => m,
        other => panic!("expected a local sparse block, got {other}"),
    }
}

#[test]
fn one_dead_row_is_eliminated() {
    // 4x4 diagonal block where row 2 holds no entry in any column block.
    let mut m = BlockMatrix::local((1, 1));
    m.set(
        0,
        0,
        CooMatrix::from_triplets(4, 4, vec![0, 1, 3], vec![0, 1, 3], vec![1.0, 2.0, 4.0]).unwrap(),
    )
    .unwrap();

    let (ret, p2) = m.eliminate_empty_rowcol(&SerialComm).unwrap();

    let p = sparse(p2.get(0, 0).unwrap());
    assert_eq!(p.shape(), (3, 4));
    // survivors {0, 1, 3} in order
    assert_abs_diff_eq!(p.value_at(0, 0).re, 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(p.value_at(1, 1).re, 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(p.value_at(2, 3).re, 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(p.value_at(2, 2).re, 0.0, epsilon = 1e-14);

    let r = sparse(ret.get(0, 0).unwrap());
    assert_eq!(r.shape(), (3, 3));
    assert_abs_diff_eq!(r.value_at(0, 0).re, 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(r.value_at(1, 1).re, 2.0, epsilon = 1e-14);
    assert_abs_diff_eq!(r.value_at(2, 2).re, 4.0, epsilon = 1e-14);
}

#[test]
fn elimination_is_idempotent_on_reduced_input() {
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
        CooMatrix::from_triplets(2, 2, vec![0, 1], vec![1, 0], vec![5.0, 6.0]).unwrap(),
    )
    .unwrap();

    let (ret, p2) = m.eliminate_empty_rowcol(&SerialComm).unwrap();
    assert!(matches!(p2.get(0, 0).unwrap(), MatrixBlock::Identity(_)));
    assert!(matches!(p2.get(1, 1).unwrap(), MatrixBlock::Identity(_)));
    for i in 0..2 {
        let original = sparse(m.get(i, i).unwrap());
        let reduced = sparse(ret.get(i, i).unwrap());
        assert_eq!(reduced.compacted(), original.compacted());
    }

    // A second pass changes nothing either.
    let (ret2, p22) = ret.eliminate_empty_rowcol(&SerialComm).unwrap();
    assert!(matches!(p22.get(0, 0).unwrap(), MatrixBlock::Identity(_)));
    assert_eq!(
        sparse(ret2.get(1, 1).unwrap()).compacted(),
        sparse(ret.get(1, 1).unwrap()).compacted()
    );
}

#[test]
fn injection_recovers_surviving_values() {
    let comm = SerialComm;
    let mut m = BlockMatrix::local((1, 1));
    m.set(
        0,
        0,
        CooMatrix::from_triplets(4, 4, vec![0, 1, 3], vec![0, 1, 3], vec![1.0, 1.0, 1.0]).unwrap(),
    )
    .unwrap();
    let (_, p2) = m.eliminate_empty_rowcol(&comm).unwrap();

    // Select-then-reinject: values at surviving indices come back
    // unchanged, the eliminated index is dropped to zero.
    let mut x = BlockMatrix::local((1, 1));
    x.set(0, 0, CooMatrix::from_column(&[10.0, 20.0, 30.0, 40.0]))
        .unwrap();
    let reduced = p2.dot(&x, &comm).unwrap();
    assert_eq!(reduced.get(0, 0).unwrap().shape(), (3, 1));

    let back = p2.transpose(&comm).unwrap().dot(&reduced, &comm).unwrap();
    let b = sparse(back.get(0, 0).unwrap());
    assert_eq!(b.shape(), (4, 1));
    assert_abs_diff_eq!(b.value_at(0, 0).re, 10.0, epsilon = 1e-14);
    assert_abs_diff_eq!(b.value_at(1, 0).re, 20.0, epsilon = 1e-14);
    assert_abs_diff_eq!(b.value_at(2, 0).re, 0.0, epsilon = 1e-14);
    assert_abs_diff_eq!(b.value_at(3, 0).re, 40.0, epsilon = 1e-14);
}

#[test]
fn dead_unknowns_shrink_coupled_column_blocks() {
    // Diagonal block with a dead row plus a right-hand-side-like column
    // block in the same block-row; the column is restricted along the
    // same survivor set.
    let mut m = BlockMatrix::local((2, 2));
    m.set(
        0,
        0,
        CooMatrix::from_triplets(3, 3, vec![0, 2], vec![0, 2], vec![1.0, 1.0]).unwrap(),
    )
    .unwrap();
    m.set(0, 1, CooMatrix::from_column(&[6.0, 0.0, 0.0])).unwrap();
    m.set(
        1,
        1,
        CooMatrix::from_triplets(1, 1, vec![0], vec![0], vec![1.0]).unwrap(),
    )
    .unwrap();
    let (ret, _) = m.eliminate_empty_rowcol(&SerialComm).unwrap();
    assert_eq!(ret.get(0, 0).unwrap().shape(), (2, 2));
    let col = sparse(ret.get(0, 1).unwrap());
    assert_eq!(col.shape(), (2, 1));
    assert_abs_diff_eq!(col.value_at(0, 0).re, 6.0, epsilon = 1e-14);
}
