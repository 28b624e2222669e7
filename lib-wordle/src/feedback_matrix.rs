//! Feedback matrix builder.
//!
//! `F[t, g]` is dense, row-major over targets, one byte per cell. Two
//! construction paths exist — scalar (direct oracle calls) and batched
//! (residual-subtraction over the whole alphabet, banded along targets so
//! memory stays bounded for the `G x G` hard-mode variant). Both must agree
//! bit-for-bit; `build` uses the batched path and cross-checks it against the
//! scalar path in debug builds.

use crate::feedback::{oracle_code, trits_to_code};
use crate::word::Word;

/// Targets banded this many rows at a time by the batched builder.
pub const DEFAULT_BAND_ROWS: usize = 256;

/// Dense `|T| x |G|` table of feedback codes.
pub struct FeedbackMatrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl FeedbackMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, t: usize, g: usize) -> u8 {
        self.data[t * self.cols + g]
    }

    /// Scalar reference builder: one oracle call per `(t, g)` pair.
    pub fn build_scalar(targets: &[Word], guesses: &[Word]) -> FeedbackMatrix {
        let rows = targets.len();
        let cols = guesses.len();
        let mut data = vec![0u8; rows * cols];

        for (t, target) in targets.iter().enumerate() {
            for (g, guess) in guesses.iter().enumerate() {
                data[t * cols + g] = oracle_code(*target, *guess);
            }
        }

        FeedbackMatrix { rows, cols, data }
    }

    /// Batched tensor path: for each target, compute per-letter residual
    /// counts by subtraction over the whole alphabet rather than inline
    /// decrement, then assign trits to every guess in the row at once.
    /// Targets are processed in bands of `band_rows` to bound peak memory.
    pub fn build_batched(targets: &[Word], guesses: &[Word], band_rows: usize) -> FeedbackMatrix {
        let rows = targets.len();
        let cols = guesses.len();
        let mut data = vec![0u8; rows * cols];

        let guess_letters: Vec<[u8; 5]> = guesses
            .iter()
            .map(|g| {
                let mut letters = [0u8; 5];
                for (i, l) in g.iter_index().enumerate() {
                    letters[i] = l;
                }
                letters
            })
            .collect();

        let band_rows = band_rows.max(1);
        let mut band_start = 0;
        while band_start < rows {
            let band_end = (band_start + band_rows).min(rows);

            for t in band_start..band_end {
                let target = targets[t];
                let mut target_letters = [0u8; 5];
                for (i, l) in target.iter_index().enumerate() {
                    target_letters[i] = l;
                }

                let mut target_count = [0u8; 26];
                for l in target_letters {
                    target_count[l as usize] += 1;
                }

                for (g, letters) in guess_letters.iter().enumerate() {
                    let mut trits = [0u8; 5];
                    let mut green_count = [0u8; 26];

                    for i in 0..5 {
                        if letters[i] == target_letters[i] {
                            trits[i] = 2;
                            green_count[letters[i] as usize] += 1;
                        }
                    }

                    let mut residual = [0u8; 26];
                    for l in 0..26 {
                        residual[l] = target_count[l] - green_count[l];
                    }

                    for i in 0..5 {
                        if trits[i] == 2 {
                            continue;
                        }

                        let letter = letters[i] as usize;
                        if residual[letter] > 0 {
                            trits[i] = 1;
                            residual[letter] -= 1;
                        }
                    }

                    data[t * cols + g] = trits_to_code(&trits);
                }
            }

            band_start = band_end;
        }

        FeedbackMatrix { rows, cols, data }
    }

    /// Build using the batched path, cross-checking against the scalar
    /// reference on every cell in debug builds (the spec's mandated
    /// debug-mode agreement check).
    pub fn build(targets: &[Word], guesses: &[Word]) -> FeedbackMatrix {
        let matrix = FeedbackMatrix::build_batched(targets, guesses, DEFAULT_BAND_ROWS);

        #[cfg(debug_assertions)]
        {
            let reference = FeedbackMatrix::build_scalar(targets, guesses);
            debug_assert_eq!(
                matrix.data, reference.data,
                "batched feedback matrix disagreed with scalar reference"
            );
        }

        matrix
    }

    /// Build the `G x G` variant used by the hard-mode filter.
    pub fn build_hard_mode(guesses: &[Word]) -> FeedbackMatrix {
        FeedbackMatrix::build(guesses, guesses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wv;

    #[test]
    fn scalar_and_batched_agree() {
        let targets = wv("crane, slate, apple, aabbb, zymiz");
        let guesses = wv("crane, slate, apple, aabbb, zymiz, pleas, abbba, mummy");

        let scalar = FeedbackMatrix::build_scalar(&targets, &guesses);
        let batched = FeedbackMatrix::build_batched(&targets, &guesses, 2);

        for t in 0..targets.len() {
            for g in 0..guesses.len() {
                assert_eq!(scalar.get(t, g), batched.get(t, g), "t={t} g={g}");
            }
        }
    }

    #[test]
    fn matrix_invariant_matches_oracle() {
        let targets = wv("crane, slate");
        let guesses = wv("crane, slate, apple");
        let matrix = FeedbackMatrix::build(&targets, &guesses);

        for (t, target) in targets.iter().enumerate() {
            for (g, guess) in guesses.iter().enumerate() {
                assert_eq!(matrix.get(t, g), oracle_code(*target, *guess));
            }
        }
    }

    #[test]
    fn diagonal_is_solved_when_target_is_guess() {
        let words = wv("crane, slate, apple");
        let matrix = FeedbackMatrix::build(&words, &words);

        for i in 0..words.len() {
            assert_eq!(matrix.get(i, i), crate::feedback::SOLVED_CODE);
        }
    }
}
