use csv::ReaderBuilder;
use ndarray::{Array1, Array2};

/// Reads a labeled CSV: integer class label in the first column, feature
/// values in the remaining columns. Returns the feature matrix, labels,
/// and the number of classes.
#[allow(dead_code)] // only the demo binary loads CSV data
pub fn load_csv(path: &str) -> (Array2<f64>, Array1<usize>, usize) {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .expect("Failed to open file");

    let mut x_data = Vec::new();
    let mut y_data = Vec::new();
    let mut width = 0;
    for result in rdr.records() {
        let record = result.expect("Failed to read record");
        let label: usize = record[0].parse().expect("Failed to parse label");
        width = record.len() - 1;
        for i in 1..record.len() {
            x_data.push(record[i].parse::<f64>().expect("Failed to parse feature"));
        }
        y_data.push(label);
    }
    let x = Array2::from_shape_vec((y_data.len(), width), x_data)
        .expect("Failed to create Array2");
    let n_labels = y_data.iter().max().map_or(0, |&m| m + 1);
    (x, Array1::from(y_data), n_labels)
}

/// Two distinguishable points carrying two different labels.
#[cfg(test)]
pub fn setup_two_labels() -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    let y = Array1::from(vec![0usize, 1]);
    (x, y)
}

/// Twenty points in four well-separated clusters along the first
/// dimension, one label per cluster.
#[cfg(test)]
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
