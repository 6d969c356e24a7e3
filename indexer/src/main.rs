use anyhow::Result;
use clap::Parser;
use crawler::Crawler;
use searchcore::{persist, Index, QueryEngine, SearchMode, WorkQueue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

mod corpus;

const DEFAULT_THREADS: usize = 5;
const DEFAULT_CRAWL_BUDGET: usize = 1;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a positional inverted index from a text corpus and/or a web crawl, then answer ranked queries", long_about = None)]
struct Cli {
    /// Corpus root: a text file, or a directory walked recursively
    #[arg(long)]
    text: Option<PathBuf>,
    /// Query file, one query per line
    #[arg(long)]
    query: Option<PathBuf>,
    /// Match query stems as prefixes of indexed words instead of exactly
    #[arg(long, default_value_t = false)]
    partial: bool,
    /// Worker thread count; presence enables pooled ingestion
    #[arg(long)]
    threads: Option<String>,
    /// Seed URL to crawl from
    #[arg(long)]
    html: Option<String>,
    /// Maximum number of pages to crawl
    #[arg(long)]
    crawl: Option<String>,
    /// Run the query phase while the crawl is still in flight instead of
    /// waiting for the barrier
    #[arg(long, default_value_t = false)]
    live_queries: bool,
    /// Write per-location token counts (default path when value omitted)
    #[arg(long, num_args = 0..=1, default_missing_value = "counts.json")]
    counts: Option<PathBuf>,
    /// Write the inverted index (default path when value omitted)
    #[arg(long, num_args = 0..=1, default_missing_value = "index.json")]
    index: Option<PathBuf>,
    /// Write ranked query results (default path when value omitted)
    #[arg(long, num_args = 0..=1, default_missing_value = "results.json")]
    results: Option<PathBuf>,
}

/// Malformed or out-of-range numeric flags fall back to their default with a
/// warning rather than aborting the run.
fn parse_or_default(flag: &str, raw: Option<&str>, default: usize) -> usize {
    match raw {
        None => default,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                tracing::warn!(flag, value = raw, default, "invalid numeric flag, using default");
                default
            }
        },
    }
}

fn run_queries(engine: &mut QueryEngine, path: Option<&Path>) {
    let Some(path) = path else { return };
    if let Err(e) = engine.process_file(path) {
        tracing::error!(error = %e, path = %path.display(), "could not process query file");
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let index = Arc::new(Index::new());
    // The crawl always runs on the pool; -threads opts local ingestion in.
    let pooled = cli.threads.is_some() || cli.html.is_some();
    let workers = parse_or_default("threads", cli.threads.as_deref(), DEFAULT_THREADS);
    let queue = pooled.then(|| Arc::new(WorkQueue::new(workers)));

    let mut crawl: Option<Arc<Crawler>> = None;
    if let Some(seed) = &cli.html {
        let budget = parse_or_default("crawl", cli.crawl.as_deref(), DEFAULT_CRAWL_BUDGET);
        let queue = queue.as_ref().expect("crawl implies a pool");
        match Crawler::new(Arc::clone(&index), budget) {
            Ok(crawler) => {
                let crawler = Arc::new(crawler);
                match Crawler::crawl(&crawler, seed, queue) {
                    Ok(()) => crawl = Some(crawler),
                    Err(e) => tracing::error!(error = %e, "crawl not started"),
                }
            }
            Err(e) => tracing::error!(error = %e, "could not build the crawl client"),
        }
    }

    if let Some(root) = &cli.text {
        let outcome = match &queue {
            Some(queue) => corpus::build_pooled(root, &index, queue),
            None => corpus::build_sequential(root, &index),
        };
        if let Err(e) = outcome {
            tracing::error!(error = %e, path = %root.display(), "corpus ingestion failed");
        }
    }

    let mode = if cli.partial { SearchMode::Partial } else { SearchMode::Exact };
    let mut engine = QueryEngine::new(Arc::clone(&index), mode);

    if cli.live_queries {
        run_queries(&mut engine, cli.query.as_deref());
    }

    // Barrier: every submitted and transitively submitted ingestion task has
    // completed past this point.
    if let Some(queue) = &queue {
        queue.finish();
    }
    if let Some(crawler) = &crawl {
        tracing::info!(pages = crawler.pages_claimed(), "crawl complete");
    }

    if !cli.live_queries {
        run_queries(&mut engine, cli.query.as_deref());
    }

    if let Some(path) = &cli.counts {
        match persist::write_counts(path, &index) {
            Ok(()) => tracing::info!(path = %path.display(), "counts written"),
            Err(e) => tracing::error!(error = %e, path = %path.display(), "could not write counts"),
        }
    }
    if let Some(path) = &cli.index {
        match persist::write_index(path, &index) {
            Ok(()) => tracing::info!(path = %path.display(), words = index.word_count(), "index written"),
            Err(e) => tracing::error!(error = %e, path = %path.display(), "could not write index"),
        }
    }
    if let Some(path) = &cli.results {
        match persist::write_results(path, engine.results()) {
            Ok(()) => tracing::info!(path = %path.display(), "results written"),
            Err(e) => tracing::error!(error = %e, path = %path.display(), "could not write results"),
        }
    }

    if let Some(queue) = &queue {
        queue.shutdown();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_flags_fall_back_to_defaults() {
        assert_eq!(parse_or_default("threads", None, 5), 5);
        assert_eq!(parse_or_default("threads", Some("8"), 5), 8);
        assert_eq!(parse_or_default("threads", Some("zero"), 5), 5);
        assert_eq!(parse_or_default("threads", Some("0"), 5), 5);
        assert_eq!(parse_or_default("crawl", Some("-3"), 1), 1);
    }

    #[test]
    fn bare_output_flags_use_default_paths() {
        let cli = Cli::parse_from(["indexer", "--counts", "--index", "--results"]);
        assert_eq!(cli.counts.unwrap(), PathBuf::from("counts.json"));
        assert_eq!(cli.index.unwrap(), PathBuf::from("index.json"));
        assert_eq!(cli.results.unwrap(), PathBuf::from("results.json"));
    }

    #[test]
    fn output_flags_accept_explicit_paths() {
        let cli = Cli::parse_from(["indexer", "--counts", "out/c.json"]);
        assert_eq!(cli.counts.unwrap(), PathBuf::from("out/c.json"));
        assert!(cli.index.is_none());
    }
}
