use word::Word;

pub mod word;

pub mod compat;
pub mod device;
pub mod errors;
pub mod evaluator;
pub mod feedback;
pub mod feedback_matrix;
pub mod kernels;
pub mod persistence;
pub mod tree;

pub fn wv(words: &str) -> Vec<Word> {
    words.split(",").map(|word| w(word.trim())).collect()
}

pub fn wv_safe(words: &str) -> Result<Vec<Word>, String> {
    let mut result = Vec::new();

    for word in words.split(',') {
        if let Some(word) = Word::new(word.trim()) {
            result.push(word);
        } else {
            return Err(format!("'{word}' was not a valid Wordle word."));
        }
    }

    Ok(result)
}

pub fn w(text: &str) -> Word {
    Word::new(text).unwrap()
}