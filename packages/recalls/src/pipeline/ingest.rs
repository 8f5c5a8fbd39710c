//! Ingestion orchestration: discovery, dedup, fetch, parse, index.
//!
//! Records are independent, so batches run with a bounded number of
//! concurrent workers. Per-record failures are logged and the batch
//! continues; cancellation stops picking up new records and leaves every
//! record in a consistent, resumable state (lifecycle transitions only
//! happen after a fully-completed step).

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::agencies::Agency;
use crate::error::Result;
use crate::pipeline::extract::parse;
use crate::traits::classify::{FoodCategoryClassifier, ReasonClassifier};
use crate::traits::fetcher::Fetcher;
use crate::traits::index::SearchIndex;
use crate::traits::store::RecallStore;
use crate::types::projection::project;
use crate::types::recall::Recall;
use crate::types::state::ParseState;

/// Configuration for batch ingestion.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of records processed concurrently.
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self { concurrency: 5 }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Outcome counts for an ingestion batch.
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    /// New records created from discovered URLs
    pub discovered: usize,

    /// Discovered URLs skipped because the canonical form already exists
    pub duplicates: usize,

    /// Records whose raw content was fetched
    pub fetched: usize,

    /// Records that completed extraction
    pub parsed: usize,

    /// Projections pushed to the search index
    pub indexed: usize,

    /// URLs that failed this batch (fetch or extraction)
    pub failed_urls: Vec<String>,

    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

impl IngestResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every record processed cleanly.
    pub fn is_success(&self) -> bool {
        self.failed_urls.is_empty() && !self.cancelled
    }

    /// Fold another batch's counts into this one.
    pub fn merge(&mut self, other: IngestResult) {
        self.discovered += other.discovered;
        self.duplicates += other.duplicates;
        self.fetched += other.fetched;
        self.parsed += other.parsed;
        self.indexed += other.indexed;
        self.failed_urls.extend(other.failed_urls);
        self.cancelled |= other.cancelled;
    }
}

/// Route a candidate URL to its agency, canonicalize, dedup, and create a
/// record in `initial` state.
///
/// Returns `None` (a logged no-op, not an error) when no agency claims the
/// URL or the canonical form already exists, rejected duplicates included.
pub async fn discover_url<S>(store: &S, url: &str) -> Result<Option<Recall>>
where
    S: RecallStore + ?Sized,
{
    let Some(agency) = Agency::for_url(url) else {
        debug!(url = %url, "url matches no agency; skipping");
        return Ok(None);
    };

    let canonical = agency.strategy().canonicalize_url(url);
    if store.url_exists(agency, &canonical).await? {
        debug!(url = %canonical, agency = %agency, "recall already in store");
        return Ok(None);
    }

    let recall = Recall::new(agency, canonical);
    store.insert_recall(&recall).await?;
    info!(url = %recall.url, agency = %agency, "discovered new recall");
    Ok(Some(recall))
}

/// Discover a batch of candidate URLs (e.g. from an agency RSS feed).
pub async fn discover_urls<S, I, U>(store: &S, urls: I) -> Result<IngestResult>
where
    S: RecallStore + ?Sized,
    I: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    let mut result = IngestResult::new();

    for url in urls {
        let url = url.as_ref();
        let Some(agency) = Agency::for_url(url) else {
            debug!(url = %url, "url matches no agency; skipping");
            continue;
        };

        let canonical = agency.strategy().canonicalize_url(url);
        if store.url_exists(agency, &canonical).await? {
            debug!(url = %canonical, agency = %agency, "recall already in store");
            result.duplicates += 1;
            continue;
        }

        let recall = Recall::new(agency, canonical);
        store.insert_recall(&recall).await?;
        info!(url = %recall.url, agency = %agency, "discovered new recall");
        result.discovered += 1;
    }

    Ok(result)
}

/// Anchor hrefs from an archive/index page, resolved against the base URL.
///
/// Anchors, javascript:, mailto:, and tel: links are skipped.
pub fn extract_index_links(base_url: &str, html: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    let href_pattern = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).unwrap();
    let mut links = Vec::new();

    for caps in href_pattern.captures_iter(html) {
        let href = &caps[1];
        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }
        if let Ok(resolved) = base.join(href) {
            links.push(resolved.to_string());
        }
    }

    links
}

/// Scan an archive/index page for recall links and create records for the
/// new ones.
pub async fn discover_from_index_page<S, F>(
    store: &S,
    fetcher: &F,
    index_url: &str,
) -> Result<IngestResult>
where
    S: RecallStore + ?Sized,
    F: Fetcher + ?Sized,
{
    info!(url = %index_url, "scanning index page for recall links");
    let bytes = fetcher.fetch(index_url).await?;
    let html = String::from_utf8_lossy(&bytes);
    let links = extract_index_links(index_url, &html);
    debug!(url = %index_url, link_count = links.len(), "extracted links");

    discover_urls(store, links).await
}

/// Fetch raw content for every record still in `initial` state.
pub async fn fetch_pending<S, F>(
    store: &S,
    fetcher: &F,
    config: &IngestConfig,
    cancel: Option<&CancellationToken>,
) -> Result<IngestResult>
where
    S: RecallStore + ?Sized,
    F: Fetcher + ?Sized,
{
    let pending = store.recalls_in_state(ParseState::Initial).await?;
    info!(count = pending.len(), "fetching pending recalls");

    let result = Mutex::new(IngestResult::new());

    stream::iter(pending)
        .for_each_concurrent(config.concurrency, |mut recall| {
            let result = &result;
            async move {
                if cancel.is_some_and(|token| token.is_cancelled()) {
                    result.lock().unwrap().cancelled = true;
                    return;
                }

                match fetcher.fetch(&recall.url).await {
                    Ok(bytes) => {
                        recall.set_html_bytes(&bytes);
                        if let Err(e) = recall.mark_retrieved() {
                            warn!(url = %recall.url, error = %e, "cannot mark retrieved");
                            result.lock().unwrap().failed_urls.push(recall.url);
                            return;
                        }
                        if let Err(e) = store.update_recall(&recall).await {
                            warn!(url = %recall.url, error = %e, "failed to persist fetched content");
                            result.lock().unwrap().failed_urls.push(recall.url);
                            return;
                        }
                        debug!(url = %recall.url, "fetched");
                        result.lock().unwrap().fetched += 1;
                    }
                    Err(e) => {
                        warn!(url = %recall.url, error = %e, "fetch failed; will retry next batch");
                        result.lock().unwrap().failed_urls.push(recall.url);
                    }
                }
            }
        })
        .await;

    let result = result.into_inner().unwrap();
    info!(
        fetched = result.fetched,
        failed = result.failed_urls.len(),
        cancelled = result.cancelled,
        "fetch batch complete"
    );
    Ok(result)
}

/// Run the extraction pipeline for every record in `retrieved` state and
/// push displayable results to the search index.
pub async fn parse_pending<S, R, C, X>(
    store: &S,
    reasons: &R,
    categories: &C,
    index: &X,
    config: &IngestConfig,
    cancel: Option<&CancellationToken>,
) -> Result<IngestResult>
where
    S: RecallStore + ?Sized,
    R: ReasonClassifier + ?Sized,
    C: FoodCategoryClassifier + ?Sized,
    X: SearchIndex + ?Sized,
{
    let pending = store.recalls_in_state(ParseState::Retrieved).await?;
    info!(count = pending.len(), "parsing pending recalls");

    let result = Mutex::new(IngestResult::new());

    stream::iter(pending)
        .for_each_concurrent(config.concurrency, |mut recall| {
            let result = &result;
            async move {
                if cancel.is_some_and(|token| token.is_cancelled()) {
                    result.lock().unwrap().cancelled = true;
                    return;
                }

                match parse(&mut recall, store, reasons, categories).await {
                    Ok(()) => {
                        result.lock().unwrap().parsed += 1;

                        if recall.parse_state.is_displayable() {
                            match project(store, &recall).await {
                                Ok(projection) => {
                                    if let Err(e) = index.index_recall(&projection).await {
                                        warn!(url = %recall.url, error = %e, "index push failed");
                                    } else {
                                        result.lock().unwrap().indexed += 1;
                                    }
                                }
                                Err(e) => {
                                    warn!(url = %recall.url, error = %e, "projection failed");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(url = %recall.url, error = %e, "parse failed");
                        result.lock().unwrap().failed_urls.push(recall.url);
                    }
                }
            }
        })
        .await;

    // Company reassignments may have orphaned rows; collect them now.
    // Best-effort: a failure here never affects extraction results.
    match store.purge_orphan_companies().await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "removed orphaned companies"),
        Err(e) => warn!(error = %e, "orphan company purge failed"),
    }

    let result = result.into_inner().unwrap();
    info!(
        parsed = result.parsed,
        indexed = result.indexed,
        failed = result.failed_urls.len(),
        cancelled = result.cancelled,
        "parse batch complete"
    );
    Ok(result)
}

/// Full batch: fetch everything pending, then parse everything retrieved.
pub async fn run<S, F, R, C, X>(
    store: &S,
    fetcher: &F,
    reasons: &R,
    categories: &C,
    index: &X,
    config: &IngestConfig,
    cancel: Option<&CancellationToken>,
) -> Result<IngestResult>
where
    S: RecallStore + ?Sized,
    F: Fetcher + ?Sized,
    R: ReasonClassifier + ?Sized,
    C: FoodCategoryClassifier + ?Sized,
    X: SearchIndex + ?Sized,
{
    let mut result = fetch_pending(store, fetcher, config, cancel).await?;

    if result.cancelled {
        return Ok(result);
    }

    let parsed = parse_pending(store, reasons, categories, index, config, cancel).await?;
    result.merge(parsed);

    Ok(result)
}
