//! Device optimizer: picks which backend scores a guess.
//!
//! Races both backends over a fixed ladder of workload sizes, aborts early
//! on a blowout or a timeout, and persists the crossover workload (in
//! `|T| * |G|` cells) where the accelerator first becomes worthwhile. Below
//! the crossover, dispatch to the CPU scalar kernel; at or above it, dispatch
//! to a rayon-parallel "accelerator" kernel — realized as data-parallel CPU
//! work here rather than a GPU binding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, WordleError};
use crate::feedback::CODE_COUNT;
use crate::feedback_matrix::FeedbackMatrix;
use crate::kernels::{self, KernelContext, Metric};
use crate::word::Word;

/// `(|T|, |G|)` pairs raced in increasing order during calibration.
const TEST_POINTS: [(usize, usize); 5] = [(10, 50), (50, 1000), (250, 1000), (1000, 1000), (2000, 2500)];

/// Accelerator considered a blowout once it is this many times slower than
/// the CPU path, provided the CPU path itself took long enough to trust.
const BLOWOUT_RATIO: f64 = 2.0;
const BLOWOUT_CPU_FLOOR_SECS: f64 = 0.010;

/// Calibration gives up on a test point once either backend exceeds this.
const TIMEOUT_SECS: f64 = 0.5;

/// Accelerator must finish within this fraction of the CPU time to count as
/// having crossed over.
const CROSSOVER_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpu,
    Accelerator,
}

#[derive(Serialize, Deserialize, Default)]
struct CalibrationFile {
    /// `calibration_key -> crossover workload (|T| * |G| cells)`.
    thresholds: HashMap<String, usize>,
}

/// Owns calibration state and routes each scoring call to a backend.
pub struct DeviceOptimizer {
    calibration_path: Option<PathBuf>,
    thresholds: HashMap<String, usize>,
    force_cpu: bool,
}

impl DeviceOptimizer {
    /// `force_cpu` corresponds to the CLI's `--cpu` flag: the accelerator is
    /// never raced or dispatched to, and no calibration file is touched.
    pub fn new(calibration_path: Option<PathBuf>, force_cpu: bool) -> DeviceOptimizer {
        let thresholds = match &calibration_path {
            Some(path) if !force_cpu => Self::load_calibration(path).unwrap_or_else(|err| {
                warn!("{err}; starting from an empty calibration");
                HashMap::new()
            }),
            _ => HashMap::new(),
        };

        DeviceOptimizer { calibration_path, thresholds, force_cpu }
    }

    fn load_calibration(path: &Path) -> Result<HashMap<String, usize>> {
        let contents = fs::read_to_string(path).map_err(|err| WordleError::CalibrationCorrupt {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        let parsed: CalibrationFile = serde_json::from_str(&contents).map_err(|err| WordleError::CalibrationCorrupt {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        Ok(parsed.thresholds)
    }

    fn save_calibration(&self) {
        let Some(path) = &self.calibration_path else { return };

        let file = CalibrationFile { thresholds: self.thresholds.clone() };
        match serde_json::to_string_pretty(&file) {
            Ok(json) => {
                if let Err(err) = fs::write(path, json) {
                    warn!("failed to persist calibration to '{}': {err}", path.display());
                }
            }
            Err(err) => warn!("failed to serialize calibration: {err}"),
        }
    }

    fn calibration_key(metric: Metric) -> String {
        match metric.k() {
            Some(k) => format!("metric_{}_k{k}_scoring-kernel", metric.id()),
            None => format!("metric_{}_scoring-kernel", metric.id()),
        }
    }

    /// Crossover workload (`|T| * |G|`) for `metric`, calibrating and
    /// persisting it on first use.
    pub fn threshold_for(&mut self, metric: Metric) -> usize {
        let key = Self::calibration_key(metric);
        if let Some(&threshold) = self.thresholds.get(&key) {
            return threshold;
        }

        let threshold = Self::calibrate();
        self.thresholds.insert(key, threshold);
        self.save_calibration();
        threshold
    }

    /// Races the CPU scalar kernel against the accelerator kernel across
    /// `TEST_POINTS`, returning the smallest workload at which the
    /// accelerator is `CROSSOVER_RATIO` or better, or `usize::MAX` if it
    /// never gets there (accelerator effectively never used).
    fn calibrate() -> usize {
        let mut threshold = usize::MAX;

        for &(t_count, g_count) in TEST_POINTS.iter() {
            let (targets, guesses) = synthetic_workload(t_count, g_count);
            let matrix = FeedbackMatrix::build(&targets, &guesses);
            let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
            let all_targets: Vec<usize> = (0..targets.len()).collect();

            let cpu_start = Instant::now();
            let _ = score_cpu(&ctx, &all_targets, None);
            let cpu_secs = cpu_start.elapsed().as_secs_f64();

            let accel_start = Instant::now();
            let _ = score_accelerator(&ctx, &all_targets, None);
            let accel_secs = accel_start.elapsed().as_secs_f64();

            info!("calibration |T|={t_count} |G|={g_count}: cpu={cpu_secs:.4}s accelerator={accel_secs:.4}s");

            if accel_secs > BLOWOUT_RATIO * cpu_secs && cpu_secs > BLOWOUT_CPU_FLOOR_SECS {
                warn!("accelerator blowout at |T|={t_count} |G|={g_count}, stopping calibration");
                break;
            }

            if cpu_secs > TIMEOUT_SECS || accel_secs > TIMEOUT_SECS {
                if accel_secs < CROSSOVER_RATIO * cpu_secs {
                    threshold = t_count * g_count;
                }
                break;
            }

            if accel_secs < CROSSOVER_RATIO * cpu_secs {
                threshold = t_count * g_count;
                break;
            }
        }

        threshold
    }

    fn backend_for(&mut self, metric: Metric, t_count: usize, g_count: usize) -> Backend {
        if self.force_cpu {
            return Backend::Cpu;
        }

        let threshold = self.threshold_for(metric);
        if t_count * g_count >= threshold {
            Backend::Accelerator
        } else {
            Backend::Cpu
        }
    }

    /// Dispatches a single Metric-0-shaped scoring call to whichever backend
    /// calibration selected. In debug builds the non-chosen backend also
    /// runs, and a disagreement is reported rather than silently resolved.
    pub fn best_candidate(
        &mut self,
        metric: Metric,
        ctx: &KernelContext,
        targets: &[usize],
        candidates: Option<&[usize]>,
    ) -> Result<(usize, bool)> {
        let g_count = kernels::candidate_pool(ctx, candidates).len();
        let backend = self.backend_for(metric, targets.len(), g_count);

        let primary = match backend {
            Backend::Cpu => score_cpu(ctx, targets, candidates),
            Backend::Accelerator => score_accelerator(ctx, targets, candidates),
        };

        #[cfg(debug_assertions)]
        {
            let shadow = match backend {
                Backend::Cpu => score_accelerator(ctx, targets, candidates),
                Backend::Accelerator => score_cpu(ctx, targets, candidates),
            };

            if primary.0 != shadow.0 {
                let (cpu_guess, accelerator_guess) = match backend {
                    Backend::Cpu => (primary.0, shadow.0),
                    Backend::Accelerator => (shadow.0, primary.0),
                };

                return Err(WordleError::KernelDisagreement {
                    first_target: ctx.target_words[targets[0]].to_string(),
                    cpu_guess: ctx.guess_words[cpu_guess].to_string(),
                    accelerator_guess: ctx.guess_words[accelerator_guess].to_string(),
                });
            }
        }

        Ok(primary)
    }
}

fn score_cpu(ctx: &KernelContext, targets: &[usize], candidates: Option<&[usize]>) -> (usize, bool) {
    kernels::metric0_best(ctx, targets, candidates)
}

/// The batched/vectorized path: for every candidate, a flat length-`CODE_COUNT`
/// histogram is scatter-incremented across the target set, candidates scored
/// in parallel via rayon, and the winner picked by a sequential reduction
/// (cheap relative to the parallel histogram work).
fn score_accelerator(ctx: &KernelContext, targets: &[usize], candidates: Option<&[usize]>) -> (usize, bool) {
    let pool = kernels::candidate_pool(ctx, candidates);
    let target_word_set: std::collections::HashSet<Word> = targets.iter().map(|&t| ctx.target_words[t]).collect();
    let n = targets.len() as f64;

    let scored: Vec<(f64, usize, bool)> = pool
        .par_iter()
        .map(|&g| {
            let mut histogram = [0u32; CODE_COUNT];
            for &t in targets {
                histogram[ctx.matrix.get(t, g) as usize] += 1;
            }
            let distinct = histogram.iter().filter(|&&count| count > 0).count() as f64;

            let in_t = target_word_set.contains(&ctx.guess_words[g]);
            let score = (n - if in_t { 1.0 } else { 0.0 }) / distinct;
            (score, g, in_t)
        })
        .collect();

    let mut best = scored[0];
    for candidate in scored.into_iter().skip(1) {
        if candidate.0 < best.0 || (candidate.0 == best.0 && candidate.1 < best.1) {
            best = candidate;
        }
    }

    (best.1, best.2)
}

/// Deterministic five-letter word from an index, used to build calibration
/// workloads without touching a real word list.
fn synthetic_word(index: usize) -> Word {
    let mut remainder = index;
    let mut letters = [0u8; 5];
    for slot in (0..5).rev() {
        letters[slot] = (remainder % 26) as u8;
        remainder /= 26;
    }

    let text: String = letters.iter().map(|&l| (b'a' + l) as char).collect();
    Word::new(&text).expect("synthetic word is always five lowercase letters")
}

fn synthetic_workload(t_count: usize, g_count: usize) -> (Vec<Word>, Vec<Word>) {
    let targets: Vec<Word> = (0..t_count).map(synthetic_word).collect();
    let guesses: Vec<Word> = (0..g_count).map(|i| synthetic_word(i + 1_000_000)).collect();
    (targets, guesses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wv;

    #[test]
    fn calibration_key_formatting() {
        assert_eq!(DeviceOptimizer::calibration_key(Metric::MinExpectedRemaining), "metric_0_scoring-kernel");
        assert_eq!(DeviceOptimizer::calibration_key(Metric::SubtreeK(5)), "metric_1_k5_scoring-kernel");
        assert_eq!(DeviceOptimizer::calibration_key(Metric::SubtreeFull), "metric_2_scoring-kernel");
    }

    #[test]
    fn forced_cpu_never_dispatches_to_accelerator() {
        let mut optimizer = DeviceOptimizer::new(None, true);
        let backend = optimizer.backend_for(Metric::MinExpectedRemaining, 10_000, 10_000);
        assert_eq!(backend, Backend::Cpu);
    }

    #[test]
    fn cpu_and_accelerator_agree_on_a_small_example() {
        let targets = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let guesses = targets.clone();
        let matrix = FeedbackMatrix::build(&targets, &guesses);
        let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
        let all: Vec<usize> = (0..targets.len()).collect();

        let cpu = score_cpu(&ctx, &all, None);
        let accelerator = score_accelerator(&ctx, &all, None);
        assert_eq!(cpu.0, accelerator.0);
        assert_eq!(cpu.1, accelerator.1);
    }

    #[test]
    fn best_candidate_reports_no_disagreement_on_agreeing_backends() {
        let targets = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let guesses = targets.clone();
        let matrix = FeedbackMatrix::build(&targets, &guesses);
        let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
        let all: Vec<usize> = (0..targets.len()).collect();

        let mut optimizer = DeviceOptimizer::new(None, true);
        let result = optimizer.best_candidate(Metric::MinExpectedRemaining, &ctx, &all, None);
        assert!(result.is_ok());
    }

    #[test]
    fn synthetic_words_are_distinct_and_well_formed() {
        let words: Vec<Word> = (0..500).map(synthetic_word).collect();
        let unique: std::collections::HashSet<Word> = words.iter().copied().collect();
        assert_eq!(unique.len(), words.len());
    }
}
