//! Developer utility that runs refit cycles on perturbed synthetic data and
//! reports how far each refit drifts from the previous tree.

use std::path::PathBuf;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stable_tree::config::AppConfig;
use stable_tree::logging;
use stable_tree::ml::cart::CartTree;
use stable_tree::ml::distance::tree_distance;
use stable_tree::ml::metrics::{accuracy_score, class_stats};
use stable_tree::ml::perturbation::perturb_dataset_with_rng;
use stable_tree::ml::stable::StableDecisionTree;
use stable_tree::ml::tree::FittedTree;

const N_FEATURES: usize = 4;
const LABEL_NOISE: f64 = 0.05;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = match &options.config_path {
        Some(path) => AppConfig::load(path).map_err(|err| err.to_string())?,
        None => AppConfig::default(),
    };
    if let Some(noise_std) = options.noise_std {
        config.perturbation.noise_std = noise_std;
    }
    config.validate().map_err(|err| err.to_string())?;
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let (x, y) = synthetic_dataset(&mut rng, options.samples);

    let mut model = StableDecisionTree::new(config.model.clone());
    model.fit(x.view(), &y, None).map_err(|err| err.to_string())?;
    let mut reference: CartTree = model
        .stable_tree()
        .cloned()
        .ok_or_else(|| "initial fit produced no tree".to_string())?;
    println!(
        "round  0  nodes={:>3}  depth={:>2}  train_acc={:.4}",
        reference.node_count(),
        reference.depth(),
        reference
            .accuracy(x.view(), &y)
            .map_err(|err| err.to_string())?
    );

    let mut last_round = None;
    for round in 1..=options.rounds {
        let (x_new, y_new) =
            perturb_dataset_with_rng(x.view(), y.as_slice(), config.perturbation.noise_std, &mut rng)
                .map_err(|err| err.to_string())?;
        model
            .fit(x_new.view(), y_new, Some(&reference))
            .map_err(|err| err.to_string())?;

        let (Some(stable), Some(base)) = (model.stable_tree(), model.base_tree()) else {
            return Err("fit completed without a tree".to_string());
        };
        let stable_drift = tree_distance(stable, &reference).map_err(|err| err.to_string())?;
        let base_drift = tree_distance(base, &reference).map_err(|err| err.to_string())?;
        let predicted = model.predict(x_new.view()).map_err(|err| err.to_string())?;
        let selected = model
            .selected_seed()
            .map_or_else(|| "base".to_string(), |seed| format!("seed {seed}"));
        println!(
            "round {round:>2}  nodes={:>3}  depth={:>2}  train_acc={:.4}  drift={:.4}  unregularized_drift={:.4}  selected={selected}",
            stable.node_count(),
            stable.depth(),
            accuracy_score(y_new, &predicted),
            stable_drift,
            base_drift,
        );

        reference = stable.clone();
        last_round = Some(predicted);
    }

    if let Some(predicted) = last_round {
        for stats in class_stats(&y, &predicted) {
            println!(
                "class {}  precision={:.3}  recall={:.3}  support={}",
                stats.label, stats.precision, stats.recall, stats.support
            );
        }
    }
    Ok(())
}

/// Uniform features in `[0, 1)` labelled by `x0 + x1 > 1`, with a few labels
/// flipped.
fn synthetic_dataset(rng: &mut StdRng, samples: usize) -> (Array2<f64>, Vec<usize>) {
    let x = Array2::from_shape_fn((samples, N_FEATURES), |_| rng.random::<f64>());
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let label = usize::from(row[0] + row[1] > 1.0);
            if rng.random_bool(LABEL_NOISE) {
                1 - label
            } else {
                label
            }
        })
        .collect();
    (x, y)
}

#[derive(Debug, Clone)]
struct CliOptions {
    config_path: Option<PathBuf>,
    rounds: usize,
    samples: usize,
    noise_std: Option<f64>,
    seed: u64,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut rounds = 5usize;
    let mut samples = 200usize;
    let mut noise_std: Option<f64> = None;
    let mut seed = 42u64;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--rounds" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rounds requires a value".to_string())?;
                rounds = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --rounds value: {value}"))?;
            }
            "--samples" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--samples requires a value".to_string())?;
                samples = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --samples value: {value}"))?;
            }
            "--noise-std" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--noise-std requires a value".to_string())?;
                noise_std = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --noise-std value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --seed value: {value}"))?;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    if samples == 0 {
        return Err("--samples must be at least 1".to_string());
    }
    Ok(CliOptions {
        config_path,
        rounds,
        samples,
        noise_std,
        seed,
    })
}

fn help_text() -> String {
    [
        "stable-tree-refit",
        "",
        "Runs refit cycles on perturbed synthetic data and reports tree drift.",
        "",
        "Usage:",
        "  stable-tree-refit [--config <stable_tree.toml>] [--rounds 5] [--samples 200]",
        "                    [--noise-std 0.05] [--seed 42]",
    ]
    .join("\n")
}
