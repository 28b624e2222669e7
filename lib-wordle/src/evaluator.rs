//! Evaluator.
//!
//! Walks a finished tree once per target and reports depth statistics.
//! Grounded in `decision_tree.py: evaluate`, including its choice to raise
//! rather than silently stop when a target's feedback code has no outgoing
//! edge — that becomes `TreeCorruption` here.

use std::time::Duration;

use crate::errors::{Result, WordleError};
use crate::feedback_matrix::FeedbackMatrix;
use crate::tree::Tree;
use crate::word::Word;

pub struct EvaluationReport {
    pub mean_depth: f64,
    pub stdev_depth: f64,
    pub max_depth: usize,
    /// `depth -> count`, dense from 1 to `max_depth`.
    pub histogram: Vec<usize>,
    pub build_runtime: Duration,
    pub vertex_count: usize,
    pub first_guess: String,
}

/// Depth of a single target within the tree: follow the edge labeled
/// `F[t, guess(v)]` until `guess(v) = t`.
fn depth_of(tree: &Tree, matrix: &FeedbackMatrix, guess_words: &[Word], target: Word, target_index: usize) -> Result<usize> {
    let mut vertex_id = tree.root;
    let mut depth = 1usize;

    loop {
        let vertex = &tree.vertices[vertex_id];
        if guess_words[vertex.guess_index] == target {
            return Ok(depth);
        }

        let code = matrix.get(target_index, vertex.guess_index);
        match vertex.children.get(&code) {
            Some(&child) => {
                vertex_id = child;
                depth += 1;
            }
            None => {
                return Err(WordleError::TreeCorruption { target: target.to_string(), vertex_id, code });
            }
        }
    }
}

/// Simulates every target through `tree`, producing depth statistics.
/// `matrix` must be the same `T x G` matrix the tree was built with.
pub fn evaluate(tree: &Tree, matrix: &FeedbackMatrix, target_words: &[Word], guess_words: &[Word], build_runtime: Duration) -> Result<EvaluationReport> {
    let mut depths = Vec::with_capacity(target_words.len());
    for (target_index, &target) in target_words.iter().enumerate() {
        depths.push(depth_of(tree, matrix, guess_words, target, target_index)?);
    }

    let n = depths.len() as f64;
    let mean_depth = depths.iter().sum::<usize>() as f64 / n;
    let variance = depths.iter().map(|&d| {
        let delta = d as f64 - mean_depth;
        delta * delta
    }).sum::<f64>() / n;
    let stdev_depth = variance.sqrt();
    let max_depth = *depths.iter().max().unwrap_or(&0);

    let mut histogram = vec![0usize; max_depth + 1];
    for &d in &depths {
        histogram[d] += 1;
    }
    histogram.remove(0);

    let first_guess = guess_words[tree.vertices[tree.root].guess_index].to_string();

    Ok(EvaluationReport {
        mean_depth,
        stdev_depth,
        max_depth,
        histogram,
        build_runtime,
        vertex_count: tree.vertex_count(),
        first_guess,
    })
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use super::*;
    use crate::device::DeviceOptimizer;
    use crate::kernels::{KernelContext, Metric};
    use crate::tree::{build, BuildOptions};
    use crate::wv;

    #[test]
    fn small_word_list_stays_within_a_few_guesses() {
        let words = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let matrix = FeedbackMatrix::build(&words, &words);
        let ctx = KernelContext { target_words: &words, guess_words: &words, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: false, diagnose: false };

        let tree = build(&ctx, &mut device, &options, None, None).unwrap();
        let report = evaluate(&tree, &matrix, &words, &words, Duration::from_secs(0)).unwrap();

        assert!(report.mean_depth <= 3.0, "mean depth {} too high for a 6-word list", report.mean_depth);
        assert!(report.max_depth <= 4, "max depth {} too high for a 6-word list", report.max_depth);
        assert_float_absolute_eq!(report.histogram.iter().sum::<usize>() as f64, words.len() as f64);
    }

    #[test]
    fn histogram_sums_to_target_count() {
        let words = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let matrix = FeedbackMatrix::build(&words, &words);
        let ctx = KernelContext { target_words: &words, guess_words: &words, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: false, diagnose: false };

        let tree = build(&ctx, &mut device, &options, None, None).unwrap();
        let report = evaluate(&tree, &matrix, &words, &words, Duration::from_secs(0)).unwrap();

        assert_eq!(report.histogram.iter().sum::<usize>(), words.len());
    }
}
