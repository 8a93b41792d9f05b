//! Query surface over the curated dataset for the external admin/web layer.
//!
//! The crawl pipeline owns dataset mutation; this store is the read/create
//! interface consumed by collaborators. HTTP serving, templating, and rate
//! limiting around it live elsewhere.

use std::fs;
use std::path::Path;

use anyhow::Context;
use appvet_core::CuratedRecord;
use thiserror::Error;

pub const CRATE_NAME: &str = "appvet-store";

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an app named {0:?} already exists")]
    DuplicateName(String),
}

/// Case-insensitive query filter; unset axes match everything.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub name_contains: Option<String>,
    pub category_contains: Option<String>,
    pub verified_only: bool,
    /// 1-based, clamped into the result range.
    pub page: usize,
    pub per_page: usize,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            name_contains: None,
            category_contains: None,
            verified_only: false,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of query results with the overall match count.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<CuratedRecord>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// In-memory store over the interchange dataset.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<CuratedRecord>,
}

impl RecordStore {
    pub fn new(records: Vec<CuratedRecord>) -> Self {
        Self { records }
    }

    /// Load from the shared dataset file; a missing file is an empty store.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let records = serde_json::from_str(&text)
            .with_context(|| format!("parsing dataset {}", path.display()))?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CuratedRecord] {
        &self.records
    }

    /// Add a record, enforcing the dataset's unique lower-cased name rule.
    pub fn create(&mut self, record: CuratedRecord) -> Result<(), StoreError> {
        let key = record.dedup_key();
        if self.records.iter().any(|existing| existing.dedup_key() == key) {
            return Err(StoreError::DuplicateName(record.app_name));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn query(&self, filter: &RecordFilter) -> RecordPage {
        let name_needle = filter.name_contains.as_deref().map(str::to_lowercase);
        let category_needle = filter.category_contains.as_deref().map(str::to_lowercase);

        let matches: Vec<&CuratedRecord> = self
            .records
            .iter()
            .filter(|record| {
                if filter.verified_only && !record.verified {
                    return false;
                }
                if let Some(needle) = &name_needle {
                    if !record.app_name.to_lowercase().contains(needle) {
                        return false;
                    }
                }
                if let Some(needle) = &category_needle {
                    if !record.category.to_lowercase().contains(needle) {
                        return false;
                    }
                }
                true
            })
            .collect();

        let total = matches.len();
        let per_page = filter.per_page.max(1);
        let total_pages = total.max(1).div_ceil(per_page);
        let page = filter.page.clamp(1, total_pages);
        let start = (page - 1) * per_page;
        let records = matches
            .into_iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect();

        RecordPage {
            records,
            total,
            page,
            total_pages,
        }
    }
}
