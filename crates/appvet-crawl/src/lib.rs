//! Directory crawl pipeline: pagination, aggregation, reconciliation, and
//! dataset I/O.
//!
//! One crawl run is a standalone batch job: load the curated dataset, walk
//! the directory category by category, merge the scrape back in without
//! touching curated fields, and persist only when something changed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use appvet_core::{CuratedRecord, ScrapedRecord};
use appvet_extract::{discover_categories, Extractor};
use appvet_fetch::{FetchOutcome, PageFetcher};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "appvet-crawl";

pub const DEFAULT_BASE_URL: &str = "https://slack.com/apps";
pub const DEFAULT_SITE_DOMAIN: &str = "https://slack.com";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// Directory taxonomy used when dynamic category discovery comes up empty.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "communication",
    "developer-tools",
    "design",
    "file-management",
    "hr-team-culture",
    "marketing",
    "office-management",
    "project-management",
    "sales",
    "security-compliance",
    "social-fun",
    "productivity",
    "customer-support",
    "analytics",
    "finance",
];

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    pub site_domain: String,
    pub dataset_path: PathBuf,
    /// Politeness pause between successive page requests for one category.
    pub request_delay: Duration,
    pub known_categories: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            site_domain: DEFAULT_SITE_DOMAIN.to_string(),
            dataset_path: PathBuf::from("./apps.json"),
            request_delay: DEFAULT_REQUEST_DELAY,
            known_categories: KNOWN_CATEGORIES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl CrawlConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("APPVET_DATASET") {
            if !path.trim().is_empty() {
                config.dataset_path = PathBuf::from(path);
            }
        }
        if let Some(delay) = std::env::var("APPVET_REQUEST_DELAY")
            .ok()
            .as_deref()
            .and_then(parse_delay_seconds)
        {
            config.request_delay = delay;
        }
        config
    }

    /// Listing page URL for a page number and optional category filter.
    /// The directory serves page 1 at the bare base URL.
    pub fn page_url(&self, page_num: u32, category: &str) -> String {
        let mut params = Vec::new();
        if !category.is_empty() {
            params.push(format!("category={category}"));
        }
        if page_num > 1 {
            params.push(format!("page={page_num}"));
        }
        if params.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}?{}", self.base_url, params.join("&"))
        }
    }
}

fn parse_delay_seconds(raw: &str) -> Option<Duration> {
    let seconds: f64 = raw.trim().parse().ok()?;
    // Rejects NaN, negatives, and values too large for a Duration.
    Duration::try_from_secs_f64(seconds).ok()
}

/// Crawl every page of one category (empty slug = no category filter).
///
/// Pagination stops on the first fetch failure, on a page yielding zero
/// records, or on a page where every record was already seen — the latter
/// catches directories that redirect overflow pages back to page 1.
/// Returns the records unique by lower-cased name, in first-seen order.
pub async fn crawl_category(
    fetcher: &dyn PageFetcher,
    extractor: &Extractor,
    config: &CrawlConfig,
    category: &str,
) -> Vec<ScrapedRecord> {
    let label = if category.is_empty() { "all apps" } else { category };
    let mut page_num = 1u32;
    let mut seen_names = HashSet::new();
    let mut collected = Vec::new();

    loop {
        let url = config.page_url(page_num, category);
        info!(%url, "fetching listing page");

        let body = match fetcher.fetch_page(&url).await {
            FetchOutcome::Body(body) => body,
            FetchOutcome::HttpStatus(status) => {
                warn!(category = label, page = page_num, status, "stopped on http status");
                break;
            }
            FetchOutcome::Transport(err) => {
                warn!(category = label, page = page_num, error = %err, "request failed");
                break;
            }
        };

        let records = extractor.extract(&body);
        if records.is_empty() {
            debug!(category = label, page = page_num, "no records on page, stopping");
            break;
        }

        let mut new_count = 0usize;
        for record in records {
            if seen_names.insert(record.dedup_key()) {
                collected.push(record);
                new_count += 1;
            }
        }
        debug!(
            category = label,
            page = page_num,
            new = new_count,
            total = collected.len(),
            "extracted page"
        );

        if new_count == 0 {
            debug!(category = label, "pagination looped, stopping");
            break;
        }

        page_num += 1;
        tokio::time::sleep(config.request_delay).await;
    }

    collected
}

/// Outcome of one full pass over the directory.
#[derive(Debug)]
pub struct DirectoryScrape {
    /// Globally unique records, first occurrence wins across passes.
    pub records: Vec<ScrapedRecord>,
    /// Crawl passes performed (uncategorized pass + one per category).
    pub passes: usize,
}

/// Crawl the whole directory: one uncategorized pass, then one pass per
/// category from the union of discovered and known-fallback slugs.
pub async fn crawl_directory(fetcher: &dyn PageFetcher, config: &CrawlConfig) -> DirectoryScrape {
    let extractor = Extractor::new(&config.base_url, &config.site_domain);

    let discovered = match fetcher.fetch_page(&config.base_url).await {
        FetchOutcome::Body(body) => {
            let slugs = discover_categories(&body);
            info!(count = slugs.len(), "discovered categories from landing page");
            slugs
        }
        FetchOutcome::HttpStatus(status) => {
            warn!(status, "landing page returned non-success status");
            Vec::new()
        }
        FetchOutcome::Transport(err) => {
            warn!(error = %err, "could not fetch landing page");
            Vec::new()
        }
    };

    // Discovery order first, fallback taxonomy appended, duplicates removed
    // keeping the first occurrence.
    let mut categories = Vec::new();
    let mut seen_slugs = HashSet::new();
    for slug in discovered
        .into_iter()
        .chain(config.known_categories.iter().cloned())
    {
        if seen_slugs.insert(slug.clone()) {
            categories.push(slug);
        }
    }

    let mut seen_names = HashSet::new();
    let mut records = Vec::new();
    let mut passes = 0usize;
    for category in std::iter::once(String::new()).chain(categories) {
        let batch = crawl_category(fetcher, &extractor, config, &category).await;
        passes += 1;
        for record in batch {
            if seen_names.insert(record.dedup_key()) {
                records.push(record);
            }
        }
        let label = if category.is_empty() { "<none>" } else { category.as_str() };
        info!(category = label, unique = records.len(), "running total");
    }

    DirectoryScrape { records, passes }
}

/// Merge a fresh scrape into the curated dataset.
///
/// Existing entries keep their relative order and all curated fields;
/// only `source_url` (when the scrape has one) and an empty `category`
/// are refreshed. Unknown apps are appended with safe defaults. Returns
/// the merged dataset and how many entries were added.
pub fn merge(
    existing: &[CuratedRecord],
    scraped: &[ScrapedRecord],
) -> (Vec<CuratedRecord>, usize) {
    let mut updated = existing.to_vec();
    let mut index: HashMap<String, usize> = updated
        .iter()
        .enumerate()
        .map(|(position, record)| (record.dedup_key(), position))
        .collect();

    let mut added = 0usize;
    for scrape in scraped {
        let key = scrape.dedup_key();
        if let Some(&position) = index.get(&key) {
            let entry = &mut updated[position];
            if !scrape.source_url.is_empty() {
                entry.source_url = scrape.source_url.clone();
            }
            if entry.category.is_empty() && !scrape.category.is_empty() {
                entry.category = scrape.category.clone();
            }
        } else {
            index.insert(key, updated.len());
            updated.push(CuratedRecord::from_scraped(scrape));
            added += 1;
        }
    }

    (updated, added)
}

/// Load the curated dataset; a missing file is an empty dataset.
pub async fn load_dataset(path: &Path) -> Result<Vec<CuratedRecord>> {
    if !fs::try_exists(path)
        .await
        .with_context(|| format!("checking dataset {}", path.display()))?
    {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading dataset {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing dataset {}", path.display()))
}

/// Persist the dataset, but only when the serialized bytes differ from
/// what is on disk. Four-space pretty printing and unescaped non-ASCII
/// keep the file byte-compatible with the interchange format.
pub async fn save_dataset_if_changed(path: &Path, records: &[CuratedRecord]) -> Result<bool> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    records
        .serialize(&mut serializer)
        .context("serializing dataset")?;

    if fs::try_exists(path)
        .await
        .with_context(|| format!("checking dataset {}", path.display()))?
    {
        let current = fs::read(path)
            .await
            .with_context(|| format!("reading dataset {}", path.display()))?;
        if current == bytes {
            return Ok(false);
        }
    }

    fs::write(path, &bytes)
        .await
        .with_context(|| format!("writing dataset {}", path.display()))?;
    Ok(true)
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passes: usize,
    pub scraped: usize,
    pub added: usize,
    pub total: usize,
    pub written: bool,
}

/// One full crawl cycle: load, scrape, reconcile, conditionally persist.
/// Safe to re-run; an empty scrape or a no-op merge leaves the dataset
/// file untouched.
pub async fn run(fetcher: &dyn PageFetcher, config: &CrawlConfig) -> Result<CrawlSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let existing = load_dataset(&config.dataset_path).await?;
    info!(
        %run_id,
        existing = existing.len(),
        path = %config.dataset_path.display(),
        "loaded curated dataset"
    );

    let scrape = crawl_directory(fetcher, config).await;
    if scrape.records.is_empty() {
        warn!(%run_id, "nothing scraped, leaving dataset untouched");
        return Ok(CrawlSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            passes: scrape.passes,
            scraped: 0,
            added: 0,
            total: existing.len(),
            written: false,
        });
    }

    let (merged, added) = merge(&existing, &scrape.records);
    let written = save_dataset_if_changed(&config.dataset_path, &merged).await?;
    info!(
        %run_id,
        scraped = scrape.records.len(),
        added,
        total = merged.len(),
        written,
        "crawl cycle finished"
    );

    Ok(CrawlSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        passes: scrape.passes,
        scraped: scrape.records.len(),
        added,
        total: merged.len(),
        written,
    })
}
