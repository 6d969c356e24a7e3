//! End-to-end: pooled ingestion into the shared index, ranked queries, and
//! the export round-trip, using only the public crate surface.

use searchcore::{DocumentIndex, Index, QueryEngine, SearchMode, WorkQueue};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn pooled_ingestion_then_ranked_query() {
    let index = Arc::new(Index::new());
    let queue = WorkQueue::new(4);

    let docs = [
        ("doc1.txt", "the cat sat"),
        ("doc2.txt", "the cat ran"),
        ("doc3.txt", "dogs bark at dogs"),
    ];
    for (location, text) in docs {
        let index = Arc::clone(&index);
        queue.execute(move || {
            index.merge(DocumentIndex::from_text(location, text));
        });
    }
    queue.finish();
    queue.shutdown();

    let mut engine = QueryEngine::new(Arc::clone(&index), SearchMode::Exact);
    engine.process_line("cat");
    let hits = &engine.results()["cat"];
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].location, "doc1.txt");
    assert_eq!(hits[1].location, "doc2.txt");

    let mut partial = QueryEngine::new(index, SearchMode::Partial);
    partial.process_line("dog");
    assert_eq!(partial.results()["dog"][0].location, "doc3.txt");
    assert_eq!(partial.results()["dog"][0].count, 2);
}

#[test]
fn exports_round_trip_to_an_identical_index() {
    let dir = tempdir().unwrap();
    let index_path = dir.path().join("index.json");
    let counts_path = dir.path().join("counts.json");

    let index = Index::new();
    index.merge(DocumentIndex::from_text("hello.txt", "hello hello world"));
    searchcore::persist::write_index(&index_path, &index).unwrap();
    searchcore::persist::write_counts(&counts_path, &index).unwrap();

    let reloaded = searchcore::persist::load_index(&index_path, &counts_path).unwrap();
    assert_eq!(index.snapshot().postings, reloaded.snapshot().postings);
    assert_eq!(index.snapshot().counts, reloaded.snapshot().counts);
}
