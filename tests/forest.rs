mod test_data;

use erf::{fit, ForestParamsBuilder};

use test_data::setup_four_clusters;

#[test]
fn test_forest_trains_prunes_and_classifies() {
    let (x, y) = setup_four_clusters();
    let params = ForestParamsBuilder::new()
        .n_trees(7)
        .s_min(1.0)
        .t_max(30)
        .seed(42)
        .build();
    let mut forest = fit(x.view(), y.view(), 4, &params).unwrap();

    assert_eq!(forest.n_trees(), 7);
    assert_eq!(
        forest.n_leaves(),
        forest.leaves_per_tree().iter().sum::<usize>()
    );

    // Every training point yields a one-hot-per-tree histogram and an
    // unmixed verdict matching its own label.
    for (i, row) in x.outer_iter().enumerate() {
        let histogram = forest.classify(row).unwrap();
        assert_eq!(histogram.len(), forest.n_leaves());
        assert_eq!(
            histogram.iter().filter(|&&v| v == 1.0).count(),
            forest.n_trees()
        );
        assert_eq!(histogram.sum(), forest.n_trees() as f64);
        assert!(forest.is_unmixed(row, y[i]));
    }

    // Pruning to a per-tree budget shrinks every tree and keeps the
    // histogram length equal to the leaf total.
    let before = forest.n_leaves();
    forest.prune(3);
    assert!(forest.n_leaves() <= before);
    for &leaves in &forest.leaves_per_tree() {
        assert!((1..=3).contains(&leaves));
    }
    let histogram = forest.classify(x.row(0)).unwrap();
    assert_eq!(histogram.len(), forest.n_leaves());
    assert_eq!(histogram.sum(), forest.n_trees() as f64);
}

#[test]
fn test_forest_reproducibility() {
    let (x, y) = setup_four_clusters();
    let params = ForestParamsBuilder::new()
        .n_trees(4)
        .s_min(1.0)
        .t_max(20)
        .seed(7)
        .build();

    let a = fit(x.view(), y.view(), 4, &params).unwrap();
    let b = fit(x.view(), y.view(), 4, &params).unwrap();

    assert_eq!(a.leaves_per_tree(), b.leaves_per_tree());
    for row in x.outer_iter() {
        assert_eq!(a.classify(row).unwrap(), b.classify(row).unwrap());
    }
}

#[test]
fn test_prune_to_stumps() {
    let (x, y) = setup_four_clusters();
    let params = ForestParamsBuilder::new()
        .n_trees(3)
        .s_min(1.0)
        .t_max(20)
        .seed(19)
        .build();
    let mut forest = fit(x.view(), y.view(), 4, &params).unwrap();

    forest.prune(1);
    assert_eq!(forest.n_leaves(), forest.n_trees());
    let histogram = forest.classify(x.row(3)).unwrap();
    // With one leaf per tree, every tree fires its only slot.
    assert!(histogram.iter().all(|&v| v == 1.0));
}
