//! Tree persistence: the on-disk JSON shape for a built tree.
//!
//! ```text
//! {
//!   "root": 0,
//!   "vertices": [ [vertex_id, guess_word], ... ],
//!   "successors": { "(v_parent, [t0,t1,t2,t3,t4])": child_id, ... }
//! }
//! ```
//! The successor key concatenates the parent id and the feedback code
//! decoded to a trit tuple; loading must reverse-encode the tuple back to a
//! base-3 code (`decision_tree.py: save` writes the analogous document).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, WordleError};
use crate::feedback::{code_to_trits, trits_to_code, L};
use crate::tree::{Tree, Vertex};
use crate::word::Word;

#[derive(Serialize, Deserialize)]
struct TreeDocument {
    root: usize,
    vertices: Vec<(usize, String)>,
    successors: HashMap<String, usize>,
}

fn successor_key(parent: usize, code: u8) -> String {
    let trits = code_to_trits(code);
    let trits_str: Vec<String> = trits.iter().map(|t| t.to_string()).collect();
    format!("({parent}, [{}])", trits_str.join(","))
}

fn parse_successor_key(key: &str) -> Option<(usize, u8)> {
    let inner = key.strip_prefix('(')?.strip_suffix(')')?;
    let (parent_str, trits_str) = inner.split_once(", [")?;
    let trits_str = trits_str.strip_suffix(']')?;

    let parent: usize = parent_str.trim().parse().ok()?;

    let mut trits = [0u8; L];
    for (i, piece) in trits_str.split(',').enumerate() {
        if i >= L {
            return None;
        }
        trits[i] = piece.trim().parse().ok()?;
    }

    Some((parent, trits_to_code(&trits)))
}

pub fn to_json(tree: &Tree, guess_words: &[Word]) -> String {
    let vertices: Vec<(usize, String)> = tree
        .vertices
        .iter()
        .enumerate()
        .map(|(id, vertex)| (id, guess_words[vertex.guess_index].to_string()))
        .collect();

    let mut successors = HashMap::new();
    for (parent_id, vertex) in tree.vertices.iter().enumerate() {
        for (&code, &child_id) in vertex.children.iter() {
            successors.insert(successor_key(parent_id, code), child_id);
        }
    }

    let document = TreeDocument { root: tree.root, vertices, successors };
    serde_json::to_string_pretty(&document).expect("tree document is always serializable")
}

pub fn from_json(json: &str, guess_words: &[Word]) -> Result<Tree> {
    let document: TreeDocument = serde_json::from_str(json)
        .map_err(|err| WordleError::InputError(format!("malformed tree document: {err}")))?;

    let word_index: HashMap<Word, usize> = guess_words.iter().enumerate().map(|(i, &w)| (w, i)).collect();

    let mut vertices: Vec<Vertex> = Vec::with_capacity(document.vertices.len());
    for (id, (expected_id, word_text)) in document.vertices.into_iter().enumerate() {
        if id != expected_id {
            return Err(WordleError::InputError(format!(
                "tree document vertex order mismatch: expected id {id}, found {expected_id}"
            )));
        }

        let word = Word::new(&word_text)
            .ok_or_else(|| WordleError::InputError(format!("'{word_text}' is not a valid word")))?;
        let guess_index = *word_index
            .get(&word)
            .ok_or_else(|| WordleError::InputError(format!("'{word_text}' is not in the guess list")))?;

        vertices.push(Vertex { guess_index, children: Default::default() });
    }

    for (key, child_id) in document.successors {
        let (parent_id, code) = parse_successor_key(&key)
            .ok_or_else(|| WordleError::InputError(format!("malformed successor key '{key}'")))?;
        let parent = vertices
            .get_mut(parent_id)
            .ok_or_else(|| WordleError::InputError(format!("successor key '{key}' references unknown vertex {parent_id}")))?;
        parent.children.insert(code, child_id);
    }

    Ok(Tree { root: document.root, vertices, hard_mode: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceOptimizer;
    use crate::feedback_matrix::FeedbackMatrix;
    use crate::kernels::{KernelContext, Metric};
    use crate::tree::{build, BuildOptions};
    use crate::wv;

    #[test]
    fn round_trips_a_small_tree() {
        let words = wv("aaaaa, aaaab, aaabb, aabbb, abbbb, bbbbb");
        let matrix = FeedbackMatrix::build(&words, &words);
        let ctx = KernelContext { target_words: &words, guess_words: &words, matrix: &matrix };
        let mut device = DeviceOptimizer::new(None, true);
        let options = BuildOptions { metric: Metric::MinExpectedRemaining, hard_mode: false, diagnose: false };

        let tree = build(&ctx, &mut device, &options, None, None).unwrap();
        let json = to_json(&tree, &words);
        let loaded = from_json(&json, &words).unwrap();

        assert_eq!(tree.root, loaded.root);
        assert_eq!(tree.vertices.len(), loaded.vertices.len());
        for (original, reloaded) in tree.vertices.iter().zip(loaded.vertices.iter()) {
            assert_eq!(original.guess_index, reloaded.guess_index);
            assert_eq!(original.children, reloaded.children);
        }
    }

    #[test]
    fn successor_key_round_trips_through_codes() {
        for code in 0..243u8 {
            let key = successor_key(7, code);
            let (parent, decoded) = parse_successor_key(&key).unwrap();
            assert_eq!(parent, 7);
            assert_eq!(decoded, code);
        }
    }
}
