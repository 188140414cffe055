// Vocabulary alignment: mapping free text onto a model's fixed vocabulary.
//
// Trained vocabularies join multi-word phrases with underscores
// ("working_memory"). To count occurrences in input text we convert each
// term to its space-separated surface form, find the longest phrase
// length in the vocabulary, and slide overlapping n-gram windows of every
// length up to that maximum over the tokenized text. Only exact matches
// against vocabulary surface forms are counted; anything else is ignored.

use std::collections::HashMap;

use regex_lite::Regex;

/// Token-count vector for input text, aligned to vocabulary order.
#[derive(Debug, Clone)]
pub struct VocabularyCounts {
    /// One count per vocabulary term, in vocabulary order.
    pub counts: Vec<f64>,
    /// Indices of terms with a non-zero count, ascending.
    pub nonzero: Vec<usize>,
}

/// Count occurrences of vocabulary terms in `text`.
///
/// Matching is case-insensitive over word tokens of two or more word
/// characters. Out-of-vocabulary phrases are silently ignored; a term
/// that never appears simply keeps a zero count.
pub fn count_vocabulary_terms(text: &str, vocabulary: &[String]) -> VocabularyCounts {
    let mut counts = vec![0.0; vocabulary.len()];
    if vocabulary.is_empty() {
        return VocabularyCounts {
            counts,
            nonzero: Vec::new(),
        };
    }

    // Underscore-joined terms -> space-separated surface forms
    let surface_to_index: HashMap<String, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, term)| (term.replace('_', " ").to_lowercase(), i))
        .collect();

    let max_len = vocabulary
        .iter()
        .map(|term| term.split('_').count())
        .max()
        .unwrap_or(1);

    let tokens = tokenize(text);

    for n in 1..=max_len {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            let phrase = window.join(" ");
            if let Some(&idx) = surface_to_index.get(&phrase) {
                counts[idx] += 1.0;
            }
        }
    }

    let nonzero = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0.0)
        .map(|(i, _)| i)
        .collect();

    VocabularyCounts { counts, nonzero }
}

/// Lowercased word tokens of two or more word characters.
fn tokenize(text: &str) -> Vec<String> {
    // Same token rule the reference vectorizer applies
    let word = Regex::new(r"\b\w\w+\b").unwrap();
    word.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}
