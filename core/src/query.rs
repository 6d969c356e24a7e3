use anyhow::Result;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::index::Index;
use crate::tokenizer;

/// Whether query stems must equal indexed words or merely prefix them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Exact,
    Partial,
}

/// One ranked hit within a query group's result list.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(rename = "where")]
    pub location: String,
    /// Location total at search time; not exported.
    #[serde(skip)]
    pub total_words: usize,
    pub count: usize,
    #[serde(serialize_with = "fixed_precision")]
    pub score: f64,
}

impl SearchResult {
    /// Score descending, then match count descending, then location
    /// ascending ignoring case.
    fn ranking(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| self.location.to_lowercase().cmp(&other.location.to_lowercase()))
    }
}

/// results.json carries scores at a fixed 8-decimal precision.
fn fixed_precision<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((score * 1e8).round() / 1e8)
}

/// Group key (joined sorted stems) -> ranked results, iterating in ascending
/// key order.
pub type ResultMap = BTreeMap<String, Vec<SearchResult>>;

/// Runs pre-tokenized query groups against the shared index. Reads are safe
/// while a crawl is still writing: each per-word lookup is internally
/// consistent, and a multi-stem group does not require one fixed snapshot.
pub struct QueryEngine {
    index: Arc<Index>,
    mode: SearchMode,
    results: ResultMap,
}

impl QueryEngine {
    pub fn new(index: Arc<Index>, mode: SearchMode) -> Self {
        Self { index, mode, results: ResultMap::new() }
    }

    /// Read a query file, one group per line, and record ranked results for
    /// each non-blank group.
    pub fn process_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        for line in BufReader::new(file).lines() {
            self.process_line(&line?);
        }
        tracing::info!(groups = self.results.len(), "queries processed");
        Ok(())
    }

    /// Tokenize one query line into a unique sorted stem group and run it.
    /// Lines with no stems are skipped entirely.
    pub fn process_line(&mut self, line: &str) {
        let stems = tokenizer::unique_stems(line);
        if stems.is_empty() {
            return;
        }
        let key = stems.iter().cloned().collect::<Vec<_>>().join(" ");
        let hits = self.search(&stems);
        self.results.insert(key, hits);
    }

    /// Rank one stem group. A location appears once per group no matter how
    /// many stems hit it; later hits only raise its match count.
    pub fn search(&self, stems: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for stem in stems {
            for word in self.matched_words(stem) {
                for (location, hits) in self.index.locations(&word) {
                    *counts.entry(location).or_insert(0) += hits;
                }
            }
        }

        let mut results: Vec<SearchResult> = counts
            .into_iter()
            .map(|(location, count)| {
                let total_words = self.index.total_words(&location);
                debug_assert!(total_words > 0, "matched location missing from counts");
                let score = count as f64 / total_words as f64;
                SearchResult { location, total_words, count, score }
            })
            .collect();
        results.sort_by(SearchResult::ranking);
        results
    }

    fn matched_words(&self, stem: &str) -> Vec<String> {
        match self.mode {
            SearchMode::Exact if self.index.contains(stem) => vec![stem.to_string()],
            SearchMode::Exact => Vec::new(),
            SearchMode::Partial => self.index.words_with_prefix(stem),
        }
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    pub fn into_results(self) -> ResultMap {
        self.results
    }
}
