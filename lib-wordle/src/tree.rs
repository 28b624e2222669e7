//! Tree builder.
//!
//! Breadth-first expansion of `(T_v, G_v, parent, parent_code, depth)`
//! frames into vertices: vertex ids are assigned in dequeue order, so they
//! fall out level-order and are deterministic across runs. The source builds
//! iteratively with an explicit stack (`decision_tree.py: create`) and runs a
//! background status thread alongside it (`start_diagnosis`/`stop_diagnosis`)
//! — grounding both the FIFO-frame shape and the diagnostic clock thread
//! below.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::compat::CompatTable;
use crate::device::DeviceOptimizer;
use crate::errors::{Result, WordleError};
use crate::feedback_matrix::FeedbackMatrix;
use crate::kernels::{self, Chooser, KernelContext, Metric};

/// One built vertex: the guess played here, and the outgoing map from
/// feedback code to child vertex id (Data Model: "Vertex").
pub struct Vertex {
    pub guess_index: usize,
    pub children: BTreeMap<u8, usize>,
}

pub struct Tree {
    pub root: usize,
    pub vertices: Vec<Vertex>,
    pub hard_mode: bool,
}

impl Tree {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

struct Frame {
    targets: Vec<usize>,
    candidates: Option<Vec<usize>>,
    parent: Option<usize>,
    parent_code: Option<u8>,
}

pub struct BuildOptions {
    pub metric: Metric,
    pub hard_mode: bool,
    pub diagnose: bool,
}

/// Builds the tree, driving the `DeviceOptimizer` for every Metric-0-shaped
/// scoring decision. `hard_matrix`/`hard_compat` (the `G x G` matrix and the
/// compatibility table) are required when `options.hard_mode` is set.
pub fn build(
    ctx: &KernelContext,
    device: &mut DeviceOptimizer,
    options: &BuildOptions,
    hard_matrix: Option<&FeedbackMatrix>,
    hard_compat: Option<&CompatTable>,
) -> Result<Tree> {
    if options.hard_mode && (hard_matrix.is_none() || hard_compat.is_none()) {
        return Err(WordleError::InputError(
            "hard mode requires a G x G feedback matrix and a compatibility table".into(),
        ));
    }

    let vertex_count = Arc::new(AtomicUsize::new(0));
    let cancel = Arc::new(AtomicBool::new(false));

    let diagnostic_handle = options.diagnose.then(|| spawn_diagnostic_clock(vertex_count.clone(), cancel.clone()));

    let result = run_build(ctx, device, options, hard_matrix, hard_compat, &vertex_count);

    cancel.store(true, Ordering::SeqCst);
    if let Some(handle) = diagnostic_handle {
        let _ = handle.join();
    }

    result
}

/// A single background thread that only reads `vertex_count`, reporting
/// progress once a second. Its termination is requested via `cancel` and
/// it is always joined before `build` returns.
fn spawn_diagnostic_clock(vertex_count: Arc<AtomicUsize>, cancel: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let start = Instant::now();
        while !cancel.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_secs(1));
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            info!(
                "building: {} vertices, {:.1}s elapsed",
                vertex_count.load(Ordering::SeqCst),
                start.elapsed().as_secs_f64()
            );
        }
    })
}

fn run_build(
    ctx: &KernelContext,
    device: &mut DeviceOptimizer,
    options: &BuildOptions,
    hard_matrix: Option<&FeedbackMatrix>,
    hard_compat: Option<&CompatTable>,
    vertex_count: &Arc<AtomicUsize>,
) -> Result<Tree> {
    let all_targets: Vec<usize> = (0..ctx.target_words.len()).collect();

    let mut queue: VecDeque<Frame> = VecDeque::new();
    queue.push_back(Frame { targets: all_targets, candidates: None, parent: None, parent_code: None });

    let mut vertices: Vec<Vertex> = Vec::new();

    // `RefCell` gives the `Chooser` (a `Fn`, not `FnMut`) interior
    // mutability over the device optimizer, since Metric 1/2's subtree
    // search needs to re-enter it at every recursive step.
    let device_cell = RefCell::new(device);
    let chooser: &Chooser<'_> = &|targets: &[usize], candidates: Option<&[usize]>| {
        match device_cell.borrow_mut().best_candidate(Metric::MinExpectedRemaining, ctx, targets, candidates) {
            Ok(result) => result,
            Err(err) => {
                warn!("{err}; falling back to the cpu kernel for this subtree step");
                kernels::metric0_best(ctx, targets, candidates)
            }
        }
    };

    while let Some(frame) = queue.pop_front() {
        let v_curr = vertices.len();
        vertex_count.store(v_curr + 1, Ordering::SeqCst);

        let candidates_slice = frame.candidates.as_deref();

        let (guess_index, _in_t) = match options.metric {
            Metric::MinExpectedRemaining if frame.targets.len() > 2 => {
                device_cell.borrow_mut().best_candidate(options.metric, ctx, &frame.targets, candidates_slice)?
            }
            _ => kernels::best_guess(options.metric, ctx, &frame.targets, candidates_slice, chooser),
        };

        vertices.push(Vertex { guess_index, children: BTreeMap::new() });

        if let (Some(parent), Some(code)) = (frame.parent, frame.parent_code) {
            vertices[parent].children.insert(code, v_curr);
        }

        if frame.targets.len() == 1 {
            continue;
        }

        let (_, groups) = kernels::partition_by_guess(ctx, &frame.targets, guess_index);

        for (code, group) in groups {
            // Hard mode: narrow the child's candidate pool to guesses still
            // consistent with the feedback just observed. Short-circuited
            // at `|T_child| <= 2`, preserving the source's heuristic.
            let child_candidates = if options.hard_mode && group.len() > 2 {
                let compat = hard_compat.expect("checked at build entry");
                let hard_matrix = hard_matrix.expect("checked at build entry");
                let parent_pool = candidates_slice
                    .map(|c| c.to_vec())
                    .unwrap_or_else(|| (0..ctx.guess_words.len()).collect());

                let filtered: Vec<usize> = parent_pool
                    .into_iter()
                    .filter(|&g_prime| compat.get(hard_matrix.get(g_prime, guess_index), code))
                    .collect();

                if filtered.is_empty() {
                    return Err(WordleError::InternalInvariant { parent_vertex_id: v_curr });
                }

                Some(filtered)
            } else {
                None
            };

            queue.push_back(Frame { targets: group, candidates: child_candidates, parent: Some(v_curr), parent_code: Some(code) });
        }
    }

    Ok(Tree { root: 0, vertices, hard_mode: options.hard_mode })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wv;

    fn small_context() -> (FeedbackMatrix, Vec<crate::word::Word>, Vec<crate::word::Word>) {
        let words = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let matrix = FeedbackMatrix::build(&words, &words);
        (matrix, words.clone(), words)
    }

    #[test]
    fn easy_mode_build_reaches_every_target() {
        let (matrix, targets, guesses) = small_context();
        let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: false, diagnose: false };

        let tree = build(&ctx, &mut device, &options, None, None).unwrap();
        assert_eq!(tree.root, 0);
        assert!(tree.vertex_count() >= targets.len());

        for (t, _) in targets.iter().enumerate() {
            let mut v = tree.root;
            loop {
                let vertex = &tree.vertices[v];
                if vertex.guess_index < targets.len() && guesses[vertex.guess_index] == targets[t] {
                    break;
                }
                let code = matrix.get(t, vertex.guess_index);
                v = *vertex.children.get(&code).expect("tree must cover every feedback code it produces");
            }
        }
    }

    #[test]
    fn hard_mode_requires_hard_matrix_and_compat() {
        let (matrix, targets, guesses) = small_context();
        let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: true, diagnose: false };

        let result = build(&ctx, &mut device, &options, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn hard_mode_build_succeeds_with_supporting_tables() {
        let (matrix, targets, guesses) = small_context();
        let ctx = KernelContext { target_words: &targets, guess_words: &guesses, matrix: &matrix };
        let hard_matrix = FeedbackMatrix::build_hard_mode(&guesses);
        let compat = CompatTable::build();
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: true, diagnose: false };

        let tree = build(&ctx, &mut device, &options, Some(&hard_matrix), Some(&compat)).unwrap();
        assert!(tree.vertex_count() >= 1);
    }
}
