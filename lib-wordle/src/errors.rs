use thiserror::Error;

/// The error taxonomy for the decision-tree core and its ambient wiring.
///
/// Only `ResourceError` and `CalibrationCorrupt` are ever auto-recovered by callers;
/// every other variant means the run aborts.
#[derive(Debug, Error)]
pub enum WordleError {
    #[error("input error: {0}")]
    InputError(String),

    #[error("accelerator unavailable, falling back to CPU: {0}")]
    ResourceError(String),

    #[error("calibration file corrupt or unreadable at '{path}': {reason}")]
    CalibrationCorrupt { path: String, reason: String },

    #[error("kernel disagreement for target set starting at {first_target}: cpu picked {cpu_guess}, accelerator picked {accelerator_guess}")]
    KernelDisagreement {
        first_target: String,
        cpu_guess: String,
        accelerator_guess: String,
    },

    #[error("tree corruption: target '{target}' has no outgoing edge for code {code} at vertex {vertex_id}")]
    TreeCorruption {
        target: String,
        vertex_id: usize,
        code: u8,
    },

    #[error("internal invariant violated: partition empty after pruning at parent frame {parent_vertex_id}")]
    InternalInvariant { parent_vertex_id: usize },
}

pub type Result<T> = std::result::Result<T, WordleError>;
