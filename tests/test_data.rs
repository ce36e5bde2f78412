use ndarray::{Array1, Array2};

/// Twenty points in four well-separated clusters along the first
/// dimension, one label per cluster.
pub fn setup_four_clusters() -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_vec(
        (20, 2),
        vec![
            0.11, 3.2, //
            0.24, 1.7, //
            0.38, 2.9, //
            0.42, 0.6, //
            0.57, 1.1, //
            10.13, 2.4, //
            10.29, 3.8, //
            10.36, 0.2, //
            10.44, 1.9, //
            10.58, 2.2, //
            20.17, 0.9, //
            20.21, 3.1, //
            20.33, 2.6, //
            20.49, 1.4, //
            20.52, 0.3, //
            30.12, 2.8, //
            30.26, 1.6, //
            30.31, 3.4, //
            30.47, 0.7, //
            30.55, 2.1, //
        ],
    )
    .unwrap();
    let y = Array1::from((0..20usize).map(|i| i / 5).collect::<Vec<_>>());
    (x, y)
}
