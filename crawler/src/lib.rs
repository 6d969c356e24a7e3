//! Budgeted web crawler feeding the shared inverted index through the work
//! queue. Fetch tasks run on pool worker threads and submit new fetch tasks
//! as they discover links, so crawl completion is exactly the queue barrier.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header;
use scraper::{Html, Selector};
use searchcore::{DocumentIndex, Index, WorkQueue};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "searchcore-crawler/0.1";
const FETCH_TIMEOUT: Duration = Duration::from_secs(12);
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Default)]
struct Frontier {
    visited: HashSet<String>,
    claimed: usize,
}

pub struct Crawler {
    client: Client,
    index: Arc<Index>,
    frontier: Mutex<Frontier>,
    budget: usize,
}

impl Crawler {
    /// A zero budget is invalid configuration; it is replaced with 1.
    pub fn new(index: Arc<Index>, budget: usize) -> Result<Self> {
        let budget = if budget == 0 {
            tracing::warn!("crawl budget must be at least 1, using 1");
            1
        } else {
            budget
        };
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client, index, frontier: Mutex::new(Frontier::default()), budget })
    }

    /// Canonicalize the seed, claim it against the budget, and submit its
    /// fetch task. The crawl is complete when `queue.finish()` returns.
    pub fn crawl(crawler: &Arc<Self>, seed: &str, queue: &Arc<WorkQueue>) -> Result<()> {
        let seed = Url::parse(seed).map_err(|e| anyhow!("invalid seed url {seed:?}: {e}"))?;
        let canonical = canonicalize(&seed);
        if !crawler.try_claim(&canonical) {
            return Err(anyhow!("seed url was not claimable"));
        }
        tracing::info!(%canonical, budget = crawler.budget, "crawl started");
        Self::submit(crawler, queue, seed);
        Ok(())
    }

    /// Pages accepted for fetching so far. Never exceeds the budget.
    pub fn pages_claimed(&self) -> usize {
        self.frontier.lock().claimed
    }

    /// Single atomic eligibility check: not yet visited and budget not
    /// exhausted. Marks the URL visited and consumes budget when it passes.
    fn try_claim(&self, canonical: &str) -> bool {
        let mut frontier = self.frontier.lock();
        if frontier.claimed >= self.budget || frontier.visited.contains(canonical) {
            return false;
        }
        frontier.visited.insert(canonical.to_string());
        frontier.claimed += 1;
        true
    }

    fn submit(crawler: &Arc<Self>, queue: &Arc<WorkQueue>, url: Url) {
        let task_crawler = Arc::clone(crawler);
        let task_queue = Arc::clone(queue);
        queue.execute(move || Self::fetch_and_index(&task_crawler, &task_queue, url));
    }

    /// One fetch task. Every failure records nothing and returns cleanly so
    /// the pool keeps draining.
    fn fetch_and_index(crawler: &Arc<Self>, queue: &Arc<WorkQueue>, url: Url) {
        let canonical = canonicalize(&url);
        let body = match crawler.fetch(&url) {
            Some(body) => body,
            None => {
                tracing::debug!(%canonical, "fetch skipped");
                return;
            }
        };

        let page = extract(&url, &body);
        for link in page.links {
            let link_canonical = canonicalize(&link);
            if crawler.try_claim(&link_canonical) {
                Self::submit(crawler, queue, link);
            }
        }

        let doc = DocumentIndex::from_text(canonical.clone(), &page.text);
        tracing::debug!(%canonical, tokens = doc.token_count(), "page indexed");
        crawler.index.merge(doc);
    }

    fn fetch(&self, url: &Url) -> Option<String> {
        let resp = self.client.get(url.clone()).send().ok()?;
        if !resp.status().is_success() {
            return None;
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            match ct.to_str() {
                Ok(v) if v.starts_with("text/html") => {}
                _ => return None,
            }
        }
        let bytes = resp.bytes().ok()?;
        if bytes.len() > MAX_BODY_BYTES {
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Canonical form compared and stored for the visited set: fragment removed,
/// scheme/host/path/query kept.
pub fn canonicalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

struct Page {
    links: Vec<Url>,
    text: String,
}

/// Resolve every hyperlink against the page URL and pull the visible body
/// text out of the document.
fn extract(base: &Url, body: &str) -> Page {
    let sel_a = Selector::parse("a").expect("valid selector");
    let sel_body = Selector::parse("body").expect("valid selector");

    let doc = Html::parse_document(body);
    let mut links = Vec::new();
    for a in doc.select(&sel_a) {
        if let Some(href) = a.value().attr("href") {
            if let Ok(url) = Url::parse(href).or_else(|_| base.join(href)) {
                if url.scheme().starts_with("http") {
                    links.push(url);
                }
            }
        }
    }
    let text = doc
        .select(&sel_body)
        .next()
        .map(|node| node.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    Page { links, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn crawler(budget: usize) -> Arc<Crawler> {
        Arc::new(Crawler::new(Arc::new(Index::new()), budget).unwrap())
    }

    #[test]
    fn canonicalize_strips_fragments_only() {
        let url = Url::parse("https://example.com/docs/page?q=1#section-2").unwrap();
        assert_eq!(canonicalize(&url), "https://example.com/docs/page?q=1");
    }

    #[test]
    fn self_links_resolve_to_the_same_canonical_url() {
        let page = Url::parse("https://example.com/a.html").unwrap();
        let fragment = page.join("#top").unwrap();
        assert_eq!(canonicalize(&page), canonicalize(&fragment));
    }

    #[test]
    fn extract_resolves_relative_links_and_text() {
        let base = Url::parse("https://example.com/dir/index.html").unwrap();
        let html = r#"<html><body>
            <p>Hello crawl world</p>
            <a href="other.html">other</a>
            <a href="/root.html">root</a>
            <a href="https://elsewhere.org/x">abs</a>
            <a href="mailto:someone@example.com">mail</a>
        </body></html>"#;
        let page = extract(&base, html);
        let links: Vec<String> = page.links.iter().map(Url::to_string).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/dir/other.html",
                "https://example.com/root.html",
                "https://elsewhere.org/x",
            ]
        );
        assert!(page.text.contains("Hello crawl world"));
    }

    #[test]
    fn claims_are_capped_at_the_budget() {
        let crawler = crawler(3);
        let mut handles = Vec::new();
        for i in 0..4 {
            let crawler = Arc::clone(&crawler);
            handles.push(thread::spawn(move || {
                let mut claimed = 0;
                for j in 0..25 {
                    // Overlapping URL ranges so threads race on duplicates too.
                    let url = format!("https://example.com/page/{}", (i * 10 + j) % 40);
                    if crawler.try_claim(&url) {
                        claimed += 1;
                    }
                }
                claimed
            }));
        }
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 3);
        assert_eq!(crawler.pages_claimed(), 3);
        assert_eq!(crawler.frontier.lock().visited.len(), 3);
    }

    #[test]
    fn duplicate_claims_are_rejected() {
        let crawler = crawler(10);
        assert!(crawler.try_claim("https://example.com/"));
        assert!(!crawler.try_claim("https://example.com/"));
        assert_eq!(crawler.pages_claimed(), 1);
    }

    #[test]
    fn zero_budget_is_clamped_to_one() {
        let crawler = crawler(0);
        assert!(crawler.try_claim("https://example.com/a"));
        assert!(!crawler.try_claim("https://example.com/b"));
    }

    #[test]
    fn invalid_seed_is_an_error() {
        let crawler = crawler(1);
        let queue = Arc::new(WorkQueue::new(1));
        assert!(Crawler::crawl(&crawler, "not a url", &queue).is_err());
        queue.shutdown();
    }
}
