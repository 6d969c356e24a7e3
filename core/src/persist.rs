use anyhow::Result;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::index::{CountMap, Index, PostingMap};
use crate::query::ResultMap;

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write location -> total token count, sorted by location. Only locations
/// with a nonzero total are present in the snapshot by construction.
pub fn write_counts(path: &Path, index: &Index) -> Result<()> {
    let counts = index.snapshot().counts;
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, &counts)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Write word -> location -> ascending positions, sorted by word then
/// location. Captured under one read section of the index.
pub fn write_index(path: &Path, index: &Index) -> Result<()> {
    let postings = index.snapshot().postings;
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, &postings)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Write ranked results keyed by query group, groups sorted by key.
pub fn write_results(path: &Path, results: &ResultMap) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, results)?;
    out.write_all(b"\n")?;
    Ok(())
}

pub fn read_index(path: &Path) -> Result<PostingMap> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn read_counts(path: &Path) -> Result<CountMap> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Rebuild an index from its two exports.
pub fn load_index(index_path: &Path, counts_path: &Path) -> Result<Index> {
    Ok(Index::from_parts(read_index(index_path)?, read_counts(counts_path)?))
}
