// Build: wasm-pack build --target web
use wasm_bindgen::prelude::*;

use lib_wordle::feedback::{code_to_trits, oracle_code};
use lib_wordle::persistence;
use lib_wordle::tree::Tree;
use lib_wordle::word::Word;
use lib_wordle::wv_safe;

/// Loads a persisted tree and the guess/target lists it was built over, and
/// replays guess sequences against it for an in-browser assessment view.
#[wasm_bindgen]
pub struct Wordle {
    targets: Vec<Word>,
    guesses: Vec<Word>,
    tree: Tree,
}

#[wasm_bindgen]
impl Wordle {
    pub fn new(targets: &str, guesses: &str, tree_json: &str) -> Result<Wordle, String> {
        let targets = Word::parse_lines(targets);
        let guesses = Word::parse_lines(guesses);
        let tree = persistence::from_json(tree_json, &guesses).map_err(|err| err.to_string())?;

        Ok(Wordle { targets, guesses, tree })
    }

    /// `guesses` is a comma-separated sequence ending in the known answer;
    /// returns, for each turn, what the tree recommended versus what was played.
    pub fn assess(&self, guesses: &str) -> Result<String, String> {
        let played = wv_safe(guesses)?;
        let answer = *played.last().ok_or("must provide one or more guesses")?;

        if !self.targets.contains(&answer) {
            return Err(format!("'{}' is not a Wordle answer", answer.to_string()));
        }

        let mut output = String::new();
        let mut vertex_id = self.tree.root;

        for (turn, &guess) in played.iter().enumerate() {
            let vertex = &self.tree.vertices[vertex_id];
            let recommended = self.guesses[vertex.guess_index];
            let code = oracle_code(answer, guess);

            output += &format!(
                "{}) played '{}' (tree recommends '{}') -> feedback {:?}\n",
                turn + 1,
                guess.to_string(),
                recommended.to_string(),
                code_to_trits(code)
            );

            if guess == answer {
                break;
            }

            match vertex.children.get(&code) {
                Some(&child) => vertex_id = child,
                None => {
                    output += "(tree has no further guidance for this feedback sequence)\n";
                    break;
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_wordle::device::DeviceOptimizer;
    use lib_wordle::feedback_matrix::FeedbackMatrix;
    use lib_wordle::kernels::{KernelContext, Metric};
    use lib_wordle::tree::{build, BuildOptions};
    use lib_wordle::wv;

    #[test]
    fn assess_reports_the_recommended_first_guess() {
        let words = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let matrix = FeedbackMatrix::build(&words, &words);
        let ctx = KernelContext { target_words: &words, guess_words: &words, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: false, diagnose: false };
        let tree = build(&ctx, &mut device, &options, None, None).unwrap();

        let json = persistence::to_json(&tree, &words);
        let targets_text = words.iter().map(|w| w.to_string()).collect::<Vec<_>>().join("\n");
        let wordle = Wordle::new(&targets_text, &targets_text, &json).unwrap();

        let report = wordle.assess("aaaaa").unwrap();
        assert!(report.contains("played 'aaaaa'"));
    }
}
