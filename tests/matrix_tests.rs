use tiny_cnn::matrix;
use tiny_cnn::matrix::{Matrix, INIT_MAX, INIT_MIN};
use tiny_cnn::CnnError;

use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_new_is_zero_filled() {
    let m = Matrix::new(3, 2);
    assert_eq!(m.shape(), (3, 2));
    assert_eq!(m.len(), 6);
    assert!(m.as_slice().iter().all(|&x| x == 0.0));
}

#[test]
fn test_default_is_empty() {
    let m = Matrix::default();
    assert_eq!(m.shape(), (0, 0));
    assert!(m.is_empty());
    assert_eq!(m.transpose(), m);
    assert_eq!(m.argmax(), None);
}

#[test]
fn test_from_vec_length_mismatch() {
    let err = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0]).unwrap_err();
    assert!(matches!(err, CnnError::DimensionMismatch { .. }));
}

#[test]
fn test_from_rows_rejects_ragged_rows() {
    let rows: [&[f32]; 2] = [&[1.0, 2.0], &[3.0]];
    assert!(matches!(
        Matrix::from_rows(&rows),
        Err(CnnError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_get_set_out_of_range() {
    let mut m = Matrix::new(2, 3);
    m.set(1, 2, 7.5).unwrap();
    assert_eq!(m.get(1, 2).unwrap(), 7.5);

    match m.get(2, 0) {
        Err(CnnError::IndexOutOfRange { row, col, rows, cols }) => {
            assert_eq!((row, col, rows, cols), (2, 0, 2, 3));
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
    assert!(matches!(m.set(0, 3, 1.0), Err(CnnError::IndexOutOfRange { .. })));
    assert!(matches!(Matrix::new(0, 0).get(0, 0), Err(CnnError::IndexOutOfRange { .. })));
}

#[test]
fn test_row_major_layout() {
    let m = matrix![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    assert_eq!(m.get(1, 0).unwrap(), 4.0);
    assert_eq!(m[(0, 2)], 3.0);
    assert_eq!(m.as_slice()[5], 6.0);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_index_panics_out_of_range() {
    let m = Matrix::new(2, 2);
    let _ = m[(2, 0)];
}

#[test]
fn test_transpose() {
    let m = matrix![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let t = m.transpose();
    assert_eq!(t.shape(), (3, 2));
    for i in 0..2 {
        for j in 0..3 {
            assert_eq!(t.get(j, i).unwrap(), m.get(i, j).unwrap());
        }
    }
    assert_eq!(t.transpose(), m);
}

#[test]
fn test_transpose_of_vector() {
    let col = Matrix::column(&[1.0, 2.0, 3.0]);
    let row = col.transpose();
    assert_eq!(row.shape(), (1, 3));
    assert_eq!(row.as_slice(), col.as_slice());
}

#[test]
fn test_randomize_stays_in_range() {
    let mut m = Matrix::new(16, 16);
    m.randomize();
    assert!(m.as_slice().iter().all(|&x| (INIT_MIN..=INIT_MAX).contains(&x)));
    assert!(m.as_slice().iter().any(|&x| x != 0.0));
}

#[test]
fn test_randomize_with_seed_is_reproducible() {
    let mut a = Matrix::new(4, 5);
    let mut b = Matrix::new(4, 5);
    a.randomize_with(&mut StdRng::seed_from_u64(7));
    b.randomize_with(&mut StdRng::seed_from_u64(7));
    assert_eq!(a, b);

    let mut c = Matrix::new(4, 5);
    c.randomize_with(&mut StdRng::seed_from_u64(8));
    assert_ne!(a, c);
}

#[test]
fn test_mutable_view_keeps_length() {
    let mut m = Matrix::new(2, 2);
    m.as_mut_slice()[3] = 9.0;
    assert_eq!(m.get(1, 1).unwrap(), 9.0);
    assert_eq!(m.into_vec(), vec![0.0, 0.0, 0.0, 9.0]);
}

#[test]
fn test_argmax() {
    assert_eq!(Matrix::column(&[0.1, 0.7, 0.2]).argmax(), Some(1));
}

#[test]
fn test_display_precision() {
    let m = matrix![[1.0, 0.5], [0.3, 2.0]];
    assert_eq!(format!("{m:.1}"), "1.0 0.5\n0.3 2.0\n");
    assert_eq!(format!("{}", matrix![[1.0]]), "1.0000\n");
}
