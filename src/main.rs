use std::{env, time::SystemTime};

use erf::{fit, Forest, ForestParamsBuilder};

mod test_data;

fn main() {
    let args: Vec<String> = env::args().collect();
    let data_path = args.get(1).map(String::as_str).unwrap_or("./dat.csv");
    let model_path = args.get(2).map(String::as_str).unwrap_or("./forest.txt");

    let (x, y, n_labels) = test_data::load_csv(data_path);
    println!(
        "Training on {} points, {} features, {} classes",
        x.nrows(),
        x.ncols(),
        n_labels
    );

    let params = ForestParamsBuilder::new()
        .n_trees(10)
        .s_min(0.5)
        .t_max(50)
        .seed(42)
        .build();

    let start = SystemTime::now();
    let mut forest = fit(x.view(), y.view(), n_labels, &params).expect("Invalid training data");
    let elapsed = start.elapsed().unwrap();
    println!("Time elapsed: {:?}", elapsed);
    for (i, leaves) in forest.leaves_per_tree().iter().enumerate() {
        println!("Tree {} trained: {} leaves", i, leaves);
    }

    let largest = forest.leaves_per_tree().iter().max().copied().unwrap_or(1);
    let budget = (largest + 1) / 2;
    forest.prune(budget);
    for (i, leaves) in forest.leaves_per_tree().iter().enumerate() {
        println!("Tree {} pruned: {} leaves", i, leaves);
    }

    forest.save(model_path).expect("Failed to write model");
    let reloaded = Forest::load(model_path).expect("Failed to read model");
    println!(
        "Model round-tripped through {model_path}: {} trees, {} leaves",
        reloaded.n_trees(),
        reloaded.n_leaves()
    );

    let probe = x.row(0);
    let histogram = reloaded.classify(probe).expect("Probe has training width");
    let hot: Vec<usize> = histogram
        .indexed_iter()
        .filter(|&(_, &v)| v > 0.0)
        .map(|(i, _)| i)
        .collect();
    println!("Probe row 0 -> leaves {:?}", hot);
    println!(
        "Probe row 0 unmixed with label {}: {}",
        y[0],
        reloaded.is_unmixed(probe, y[0])
    );
}
