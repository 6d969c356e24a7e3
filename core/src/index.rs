use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::tokenizer;

/// 1-based occurrence index of a stem within one location's token stream.
pub type Position = usize;

/// word -> location -> ordered, duplicate-free positions.
pub type PostingMap = BTreeMap<String, BTreeMap<String, BTreeSet<Position>>>;

/// location -> total token count. Only locations with a nonzero total appear.
pub type CountMap = BTreeMap<String, usize>;

/// Partial index for a single document, built lock-free by the task that
/// processes it and folded into the shared [`Index`] with one `merge` call.
#[derive(Debug)]
pub struct DocumentIndex {
    location: String,
    entries: BTreeMap<String, BTreeSet<Position>>,
    token_count: usize,
}

impl DocumentIndex {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into(), entries: BTreeMap::new(), token_count: 0 }
    }

    /// Tokenize one line and append its stems, continuing the position
    /// counter from previous lines of the same document.
    pub fn extend_line(&mut self, line: &str) {
        for stem in tokenizer::stems(line) {
            self.token_count += 1;
            self.entries.entry(stem).or_default().insert(self.token_count);
        }
    }

    pub fn from_text(location: impl Into<String>, text: &str) -> Self {
        let mut doc = Self::new(location);
        for line in text.lines() {
            doc.extend_line(line);
        }
        doc
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }
}

/// Full deep copy of the index state, captured under one read section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub postings: PostingMap,
    pub counts: CountMap,
}

#[derive(Default)]
struct Inner {
    postings: PostingMap,
    counts: CountMap,
}

/// Shared inverted index: word -> location -> positions, plus per-location
/// token totals, behind a single reader/writer lock. Mutation happens during
/// ingestion only; every read accessor returns an independent copy.
#[derive(Default)]
pub struct Index {
    inner: RwLock<Inner>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from previously exported postings and counts.
    pub fn from_parts(postings: PostingMap, counts: CountMap) -> Self {
        Self { inner: RwLock::new(Inner { postings, counts }) }
    }

    /// Record one occurrence. Re-adding an existing position is a no-op.
    /// Callers are responsible for pairing adds with a `record_count` for the
    /// location; the index does not infer totals from adds.
    pub fn add(&self, word: &str, location: &str, position: Position) {
        assert!(position > 0, "positions are 1-based");
        let mut inner = self.inner.write();
        inner
            .postings
            .entry(word.to_string())
            .or_default()
            .entry(location.to_string())
            .or_default()
            .insert(position);
    }

    /// Store a location's total token count. Zero totals are not recorded.
    pub fn record_count(&self, location: &str, total: usize) {
        if total == 0 {
            return;
        }
        self.inner.write().counts.insert(location.to_string(), total);
    }

    /// Fold one document's partial index and its token count into the shared
    /// maps in a single write section. Equivalent to the corresponding
    /// sequence of `add` calls plus `record_count`, but takes the lock once
    /// per document instead of once per token.
    pub fn merge(&self, doc: DocumentIndex) {
        if doc.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        for (word, positions) in doc.entries {
            inner
                .postings
                .entry(word)
                .or_default()
                .entry(doc.location.clone())
                .or_default()
                .extend(positions);
        }
        inner.counts.insert(doc.location, doc.token_count);
    }

    pub fn contains(&self, word: &str) -> bool {
        self.inner.read().postings.contains_key(word)
    }

    /// Locations indexed under `word`, with the number of recorded positions
    /// at each. Returns a copy; unknown words yield an empty map.
    pub fn locations(&self, word: &str) -> BTreeMap<String, usize> {
        let inner = self.inner.read();
        inner
            .postings
            .get(word)
            .map(|locs| locs.iter().map(|(loc, positions)| (loc.clone(), positions.len())).collect())
            .unwrap_or_default()
    }

    /// Positions of `word` at `location`, ascending. Copy; empty if unknown.
    pub fn positions(&self, word: &str, location: &str) -> Vec<Position> {
        let inner = self.inner.read();
        inner
            .postings
            .get(word)
            .and_then(|locs| locs.get(location))
            .map(|positions| positions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Indexed words that `prefix` is a prefix of, ascending.
    pub fn words_with_prefix(&self, prefix: &str) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .postings
            .range(prefix.to_string()..)
            .take_while(|(word, _)| word.starts_with(prefix))
            .map(|(word, _)| word.clone())
            .collect()
    }

    /// Total token count for a location, or 0 if unknown.
    pub fn total_words(&self, location: &str) -> usize {
        self.inner.read().counts.get(location).copied().unwrap_or(0)
    }

    /// Number of distinct indexed words.
    pub fn word_count(&self) -> usize {
        self.inner.read().postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().postings.is_empty()
    }

    /// Deep copy of both maps under one read section, so exports reflect a
    /// single consistent state.
    pub fn snapshot(&self) -> IndexSnapshot {
        let inner = self.inner.read();
        IndexSnapshot { postings: inner.postings.clone(), counts: inner.counts.clone() }
    }
}
