use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_ALPHA: Regex = Regex::new(r"[^\p{Alphabetic}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Clean a line of text: NFD normalization (splitting diacritics off so they
/// are dropped with the other non-alphabetic characters), then lowercase.
fn clean(text: &str) -> String {
    let decomposed = text.nfd().collect::<String>();
    NON_ALPHA.replace_all(&decomposed, "").to_lowercase()
}

/// Tokenize one line into stems, in occurrence order. Position numbering is
/// owned by the caller, which keeps a running counter across lines.
pub fn stems(line: &str) -> Vec<String> {
    clean(line)
        .split_whitespace()
        .map(|word| STEMMER.stem(word).to_string())
        .collect()
}

/// Tokenize one line into a deduplicated, lexicographically sorted stem set.
/// Query groups are built from this form.
pub fn unique_stems(line: &str) -> BTreeSet<String> {
    stems(line).into_iter().collect()
}
