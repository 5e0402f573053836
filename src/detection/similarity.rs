//! Token-overlap similarity
//!
//! Texts are compared as sets of lowercase tokens with punctuation removed.

use std::collections::HashSet;

/// Lowercase, strip punctuation and split on whitespace
pub fn tokenize(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercased text with every character that is neither a word character nor
/// whitespace removed
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`; 0 when the union is empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of two texts
pub fn similarity(text1: &str, text2: &str) -> f64 {
    jaccard(&tokenize(text1), &tokenize(text2))
}

/// Whitespace-separated word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
