//! Local corpus ingestion: walk a file tree, build one partial index per
//! document, and merge each into the shared index, either on the worker
//! pool or inline when no concurrency was requested.

use anyhow::{ensure, Result};
use searchcore::{DocumentIndex, Index, WorkQueue};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            ext == "txt" || ext == "text"
        })
        .unwrap_or(false)
}

/// A file root is ingested as-is; a directory root is walked recursively and
/// filtered to text files.
fn discover(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_text_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Read one document line by line into its partial index. The position
/// counter runs across lines, 1-based.
fn index_file(path: &Path) -> Result<DocumentIndex> {
    let file = File::open(path)?;
    let mut doc = DocumentIndex::new(path.display().to_string());
    for line in BufReader::new(file).lines() {
        doc.extend_line(&line?);
    }
    Ok(doc)
}

fn merge_file(path: &Path, index: &Index) {
    match index_file(path) {
        Ok(doc) => index.merge(doc),
        // One unreadable document never stops ingestion.
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "skipping document"),
    }
}

pub fn build_sequential(root: &Path, index: &Index) -> Result<()> {
    ensure!(root.exists(), "no such corpus path: {}", root.display());
    let files = discover(root);
    for file in &files {
        merge_file(file, index);
    }
    tracing::info!(files = files.len(), "corpus ingested");
    Ok(())
}

/// Submit one indexing task per file. Completion is observed through the
/// queue barrier, not here.
pub fn build_pooled(root: &Path, index: &Arc<Index>, queue: &WorkQueue) -> Result<()> {
    ensure!(root.exists(), "no such corpus path: {}", root.display());
    let files = discover(root);
    tracing::info!(files = files.len(), "corpus submitted");
    for file in files {
        let index = Arc::clone(index);
        queue.execute(move || merge_file(&file, &index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_corpus(dir: &Path) {
        fs::write(dir.join("doc1.txt"), "the cat sat").unwrap();
        fs::write(dir.join("doc2.text"), "the cat ran").unwrap();
        fs::write(dir.join("notes.md"), "ignored markdown").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/doc3.txt"), "dogs bark").unwrap();
    }

    #[test]
    fn discovers_only_text_files_recursively() {
        let dir = tempdir().unwrap();
        write_corpus(dir.path());
        let mut names: Vec<String> = discover(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["doc1.txt", "doc2.text", "doc3.txt"]);
    }

    #[test]
    fn a_file_root_is_ingested_regardless_of_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "hello world").unwrap();
        assert_eq!(discover(&path), vec![path]);
    }

    #[test]
    fn sequential_and_pooled_builds_agree() {
        let dir = tempdir().unwrap();
        write_corpus(dir.path());

        let sequential = Index::new();
        build_sequential(dir.path(), &sequential).unwrap();

        let pooled = Arc::new(Index::new());
        let queue = WorkQueue::new(4);
        build_pooled(dir.path(), &pooled, &queue).unwrap();
        queue.finish();
        queue.shutdown();

        assert_eq!(sequential.snapshot().postings, pooled.snapshot().postings);
        assert_eq!(sequential.snapshot().counts, pooled.snapshot().counts);
        assert_eq!(pooled.snapshot().counts.len(), 3);
    }

    #[test]
    fn positions_continue_across_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "alpha beta\ngamma alpha\n").unwrap();
        let doc = index_file(&path).unwrap();
        let index = Index::new();
        index.merge(doc);
        assert_eq!(index.positions("alpha", &path.display().to_string()), vec![1, 4]);
        assert_eq!(index.total_words(&path.display().to_string()), 4);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let index = Index::new();
        assert!(build_sequential(&dir.path().join("absent"), &index).is_err());
    }
}
