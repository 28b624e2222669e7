//! CLI entry point: builds a decision tree over a target/guess word list
//! pair, optionally persists it, and reports depth statistics.
//!
//! This wraps the core components (feedback matrix, compatibility table,
//! device optimizer, tree builder, evaluator) and is itself an external
//! collaborator, not part of the core engine.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use lib_wordle::compat::CompatTable;
use lib_wordle::device::DeviceOptimizer;
use lib_wordle::errors::WordleError;
use lib_wordle::evaluator;
use lib_wordle::feedback_matrix::FeedbackMatrix;
use lib_wordle::kernels::{KernelContext, Metric, SUBTREE_K_DEFAULT};
use lib_wordle::persistence;
use lib_wordle::tree::{self, BuildOptions};
use lib_wordle::word::Word;

/// Build an optimal Wordle decision tree over a solutions/guesses word list pair.
#[derive(Parser, Debug)]
#[command(name = "wordle", version, about)]
struct Cli {
    /// Path to the target/solution word list, one lowercase 5-letter word per line.
    #[arg(long, default_value = "../data/solutions.txt")]
    solutions: PathBuf,

    /// Path to the allowed-guess word list (a superset of `solutions`).
    #[arg(long, default_value = "../data/guesses.txt")]
    guesses: PathBuf,

    /// Build a hard-mode tree: every guess must stay consistent with prior feedback.
    #[arg(long)]
    hard_mode: bool,

    /// Scoring metric: 0 = min expected remaining set size, 1 = subtree-k, 2 = subtree-full.
    #[arg(long, default_value_t = 0)]
    metric: u8,

    /// Candidate-pool size used by Metric 1.
    #[arg(long, default_value_t = SUBTREE_K_DEFAULT)]
    k: usize,

    /// Disable the accelerator entirely; always dispatch to the CPU kernel.
    #[arg(long)]
    cpu: bool,

    /// Persist the built tree as JSON. Easy-mode and hard-mode trees are
    /// written to different file names so one run never clobbers the other.
    #[arg(long)]
    save_tree: bool,

    /// Path to the device calibration cache.
    #[arg(long, default_value = "../data/calibration.json")]
    calibration: PathBuf,

    /// Suppress the background diagnostic clock thread.
    #[arg(long)]
    no_diagnosis: bool,

    /// Skip the evaluation pass after the build.
    #[arg(long)]
    no_evaluate: bool,
}

fn parse_metric(raw: u8, k: usize) -> Result<Metric, WordleError> {
    match raw {
        0 => Ok(Metric::MinExpectedRemaining),
        1 => Ok(Metric::SubtreeK(k)),
        2 => Ok(Metric::SubtreeFull),
        other => Err(WordleError::InputError(format!("--metric must be 0, 1, or 2, got {other}"))),
    }
}

fn load_words(path: &std::path::Path) -> Result<Vec<Word>, WordleError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| WordleError::InputError(format!("failed to read '{}': {err}", path.display())))?;

    let mut words = Vec::new();
    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let word = Word::new(line).ok_or_else(|| {
            WordleError::InputError(format!(
                "'{}' line {}: '{line}' is not a valid 5-letter lowercase word",
                path.display(),
                line_number + 1
            ))
        })?;
        words.push(word);
    }

    Ok(words)
}

fn run(cli: Cli) -> Result<(), WordleError> {
    let metric = parse_metric(cli.metric, cli.k)?;

    let targets = load_words(&cli.solutions)?;
    let guesses = load_words(&cli.guesses)?;
    info!("loaded {} targets, {} guesses", targets.len(), guesses.len());

    let matrix = FeedbackMatrix::build(&targets, &guesses);
    let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };

    let hard_matrix = cli.hard_mode.then(|| FeedbackMatrix::build_hard_mode(&guesses));
    let compat = cli.hard_mode.then(CompatTable::build);

    let mut device = DeviceOptimizer::new(Some(cli.calibration.clone()), cli.cpu);
    let options = BuildOptions { metric, hard_mode: cli.hard_mode, diagnose: !cli.no_diagnosis };

    let build_start = Instant::now();
    let built = tree::build(&ctx, &mut device, &options, hard_matrix.as_ref(), compat.as_ref())?;
    let build_runtime = build_start.elapsed();
    info!("built {} vertices in {:.2}s", built.vertex_count(), build_runtime.as_secs_f64());

    if cli.save_tree {
        let file_name = if cli.hard_mode { "decision_tree_hard.json" } else { "decision_tree.json" };
        let path = std::path::Path::new("../data").join(file_name);
        let json = persistence::to_json(&built, &guesses);
        std::fs::write(&path, json)
            .map_err(|err| WordleError::InputError(format!("failed to write '{}': {err}", path.display())))?;
        info!("wrote tree to '{}'", path.display());
    }

    if !cli.no_evaluate {
        let report = evaluator::evaluate(&built, &matrix, &targets, &guesses, build_runtime)?;
        info!(
            "first guess '{}', mean depth {:.3}, stdev {:.3}, max depth {}, vertices {}",
            report.first_guess, report.mean_depth, report.stdev_depth, report.max_depth, report.vertex_count
        );
        for (depth, count) in report.histogram.iter().enumerate() {
            if *count > 0 {
                info!("  depth {}: {count} targets", depth + 1);
            }
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}
