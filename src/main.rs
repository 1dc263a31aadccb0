use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use sylva_io::ItemReader;
use sylva_tree::{
    DecisionPath, DecisionTree, DecisionTreeConfig, Item, Model, Predicate, PredicateSelection,
    PredicateSet, RandomForest, RandomForestConfig, RankedAttribute, Sampling, Value, VoteTally,
};

#[derive(Parser)]
#[command(name = "sylva")]
#[command(about = "Entropy-driven decision trees and forests over CSV data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the randomised forest sampling strategies
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Stopping rules and split search settings for each tree.
#[derive(Args, Debug, Clone)]
struct TreeArgs {
    /// Attribute holding the category to learn
    #[arg(long, default_value = sylva_tree::DEFAULT_CATEGORY_ATTR)]
    category: String,

    /// Nodes with this many items or fewer become leaves (0 = default)
    #[arg(long, default_value_t = 1)]
    min_items_count: usize,

    /// Nodes with entropy at or below this value become leaves
    #[arg(long, default_value_t = 0.01)]
    entropy_threshold: f64,

    /// Maximum number of split levels (0 = default)
    #[arg(long, default_value_t = 70)]
    max_depth: usize,

    /// Attribute to exclude from split search (repeatable)
    #[arg(long = "ignore")]
    ignored: Vec<String>,

    /// Predicates to try: "by-type", "all", or a comma list such as "==,>="
    #[arg(long, default_value = "by-type")]
    predicates: String,

    /// Collapse splits whose two leaves predict the same category
    #[arg(long, default_value_t = false)]
    merge_leaves: bool,
}

/// Forest sampling strategy names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum SamplingArg {
    RoundRobin,
    Subsample,
    Bootstrap,
}

#[derive(Subcommand)]
enum Command {
    /// Train a decision tree (or a forest with --trees) and save it
    Train {
        /// Path to the training CSV file
        #[arg(long)]
        data: PathBuf,

        /// Output path for the trained model binary
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        tree: TreeArgs,

        /// Train a forest with this many trees instead of a single tree
        #[arg(long)]
        trees: Option<usize>,

        /// How the training set is divided among forest trees
        #[arg(long, value_enum, default_value = "round-robin")]
        sampling: SamplingArg,

        /// Per-item keep probability for subsample sampling
        #[arg(long, default_value_t = 0.7)]
        keep_probability: f64,

        /// Fraction of the training set drawn per tree for bootstrap sampling
        #[arg(long, default_value_t = 1.0)]
        bootstrap_fraction: f64,
    },

    /// Predict categories for every row of a CSV file
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the CSV file of items to classify
        #[arg(long)]
        data: PathBuf,

        /// Include the decision path (one per tree for forest models)
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    kind: &'static str,
    n_items: usize,
    n_trees: usize,
    n_nodes: usize,
    n_leaves: usize,
    max_depth: usize,
    importances: Vec<RankedAttribute>,
}

#[derive(Serialize)]
struct PredictOutput {
    n_items: usize,
    model_n_trees: usize,
    predictions: Vec<PredictionOutput>,
}

#[derive(Serialize)]
struct PredictionOutput {
    row: usize,
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    votes: Option<Vec<VoteOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree_paths: Option<Vec<Vec<String>>>,
}

#[derive(Serialize)]
struct VoteOutput {
    category: String,
    votes: usize,
}

fn parse_predicates(s: &str) -> Result<PredicateSelection> {
    match s {
        "by-type" => Ok(PredicateSelection::ByValueType),
        "all" => Ok(PredicateSelection::Fixed(PredicateSet::all())),
        list => {
            let predicates = list
                .split(',')
                .map(|name| name.trim().parse::<Predicate>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("invalid predicate list: {list}"))?;
            Ok(PredicateSelection::Fixed(PredicateSet::from_predicates(
                predicates,
            )))
        }
    }
}

fn build_tree_config(args: &TreeArgs) -> Result<DecisionTreeConfig> {
    Ok(DecisionTreeConfig::new()
        .with_category_attr(args.category.clone())
        .with_min_items_count(args.min_items_count)
        .with_entropy_threshold(args.entropy_threshold)
        .with_max_tree_depth(args.max_depth)
        .with_ignored_attributes(args.ignored.iter().cloned())
        .with_predicates(parse_predicates(&args.predicates)?)
        .with_merge_uniform_leaves(args.merge_leaves))
}

fn build_sampling(arg: SamplingArg, keep_probability: f64, bootstrap_fraction: f64) -> Sampling {
    match arg {
        SamplingArg::RoundRobin => Sampling::RoundRobin,
        SamplingArg::Subsample => Sampling::Subsample { keep_probability },
        SamplingArg::Bootstrap => Sampling::Bootstrap {
            fraction: bootstrap_fraction,
        },
    }
}

fn render_path(path: &DecisionPath<'_>) -> Vec<String> {
    path.steps.iter().map(ToString::to_string).collect()
}

fn tree_prediction(
    tree: &DecisionTree,
    row: usize,
    item: &Item,
    explain: bool,
) -> PredictionOutput {
    PredictionOutput {
        row,
        category: Some(tree.predict(item).to_string()),
        votes: None,
        path: explain.then(|| render_path(&tree.decision_path(item))),
        tree_paths: None,
    }
}

fn forest_prediction(
    forest: &RandomForest,
    row: usize,
    item: &Item,
    tally: &VoteTally,
    explain: bool,
) -> PredictionOutput {
    PredictionOutput {
        row,
        category: tally.winner().map(Value::to_string),
        votes: Some(
            tally
                .iter()
                .map(|(category, votes)| VoteOutput {
                    category: category.to_string(),
                    votes,
                })
                .collect(),
        ),
        path: None,
        tree_paths: explain.then(|| {
            forest
                .decision_paths(item)
                .iter()
                .map(render_path)
                .collect()
        }),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            model,
            tree,
            trees,
            sampling,
            keep_probability,
            bootstrap_fraction,
        } => {
            // 1. Read training items
            let items = ItemReader::new(&data)
                .read()
                .context("failed to read training CSV")?;
            info!(n_items = items.len(), "training set loaded");

            let tree_config = build_tree_config(&tree)?;

            // 2. Train
            let (trained, output) = match trees {
                None => {
                    let fitted = tree_config.fit(&items).context("tree training failed")?;
                    let output = TrainOutput {
                        kind: "tree",
                        n_items: items.len(),
                        n_trees: 1,
                        n_nodes: fitted.n_nodes(),
                        n_leaves: fitted.n_leaves(),
                        max_depth: fitted.depth(),
                        importances: fitted.ranked_importances(),
                    };
                    (Model::Tree(fitted), output)
                }
                Some(trees_count) => {
                    let forest = RandomForestConfig::new(trees_count)?
                        .with_tree_config(tree_config)
                        .with_sampling(build_sampling(
                            sampling,
                            keep_probability,
                            bootstrap_fraction,
                        ))
                        .with_seed(cli.seed)
                        .fit(&items)
                        .context("forest training failed")?;
                    let output = forest_summary(&forest, items.len());
                    (Model::Forest(forest), output)
                }
            };

            // 3. Save model
            trained.save(&model).context("failed to save model")?;
            info!(path = %model.display(), "model saved");

            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            data,
            explain,
        } => {
            // 1. Load model
            let loaded = Model::load(&model).context("failed to load model")?;
            info!(
                n_trees = loaded.n_trees(),
                category_attr = loaded.category_attr(),
                "model loaded"
            );

            // 2. Read items
            let items = ItemReader::new(&data)
                .read()
                .context("failed to read items CSV")?;
            info!(n_items = items.len(), "items loaded");

            // 3. Predict
            let predictions: Vec<PredictionOutput> = match &loaded {
                Model::Tree(tree) => items
                    .iter()
                    .enumerate()
                    .map(|(row, item)| tree_prediction(tree, row, item, explain))
                    .collect(),
                Model::Forest(forest) => forest
                    .predict_batch(&items)
                    .iter()
                    .zip(&items)
                    .enumerate()
                    .map(|(row, (tally, item))| {
                        forest_prediction(forest, row, item, tally, explain)
                    })
                    .collect(),
            };

            let output = PredictOutput {
                n_items: items.len(),
                model_n_trees: loaded.n_trees(),
                predictions,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn forest_summary(forest: &RandomForest, n_items: usize) -> TrainOutput {
    let trees = forest.trees();
    TrainOutput {
        kind: "forest",
        n_items,
        n_trees: trees.len(),
        n_nodes: trees.iter().map(DecisionTree::n_nodes).sum(),
        n_leaves: trees.iter().map(DecisionTree::n_leaves).sum(),
        max_depth: trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
        importances: forest.attribute_importances(),
    }
}
