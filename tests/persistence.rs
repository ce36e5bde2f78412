mod test_data;

use std::env;
use std::fs;

use erf::{fit, Forest, ForestParamsBuilder, ParseError};

use test_data::setup_four_clusters;

fn temp_model_path(name: &str) -> std::path::PathBuf {
    env::temp_dir().join(format!("erf_{}_{}.txt", name, std::process::id()))
}

#[test]
fn test_save_load_round_trip() {
    let (x, y) = setup_four_clusters();
    let params = ForestParamsBuilder::new()
        .n_trees(5)
        .s_min(1.0)
        .t_max(25)
        .seed(77)
        .build();
    let forest = fit(x.view(), y.view(), 4, &params).unwrap();

    let path = temp_model_path("round_trip");
    forest.save(&path).unwrap();
    let reloaded = Forest::load(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(reloaded.n_trees(), forest.n_trees());
    assert_eq!(reloaded.leaves_per_tree(), forest.leaves_per_tree());
    for row in x.outer_iter() {
        assert_eq!(
            reloaded.classify(row).unwrap(),
            forest.classify(row).unwrap()
        );
        for label in 0..4 {
            assert_eq!(
                reloaded.is_unmixed(row, label),
                forest.is_unmixed(row, label)
            );
        }
    }
}

#[test]
fn test_load_missing_file_is_io_error() {
    let path = temp_model_path("does_not_exist");
    assert!(matches!(Forest::load(&path), Err(ParseError::Io(_))));
}

#[test]
fn test_load_corrupt_file_is_fatal() {
    let path = temp_model_path("corrupt");
    fs::write(&path, "<forest><node score=\"0.4\"").unwrap();
    let result = Forest::load(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(
        result,
        Err(ParseError::UnexpectedEnd { .. } | ParseError::UnexpectedToken { .. })
    ));
}
