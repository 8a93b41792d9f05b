//! Core domain model for the appvet directory pipeline.

use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "appvet-core";

/// Ephemeral extraction result for one directory listing entry.
///
/// Produced by the content extractor, consumed by the crawler and the
/// reconciliation engine. Records without a name are discarded at the
/// extraction boundary, so `app_name` is non-empty by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub app_name: String,
    pub source_url: String,
    pub description: String,
    pub category: String,
}

impl ScrapedRecord {
    /// Deduplication identity: the lower-cased app name.
    pub fn dedup_key(&self) -> String {
        self.app_name.to_lowercase()
    }
}

/// Persisted dataset entry combining scraped facts with hand-entered
/// security assessment fields.
///
/// Field order matches the JSON interchange format consumed by the
/// external record store; do not reorder or extend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedRecord {
    pub app_name: String,
    pub category: String,
    pub developer: String,
    pub security_rating: String,
    pub permissions: Vec<String>,
    pub data_access: String,
    pub verified: bool,
    pub security_notes: String,
    pub source_url: String,
    pub privacy_policy_url: String,
}

impl CuratedRecord {
    /// Lookup identity, unique within one dataset.
    pub fn dedup_key(&self) -> String {
        self.app_name.to_lowercase()
    }

    /// Build a new entry from a scrape with safe curation defaults.
    ///
    /// Only `security_notes` is seeded automatically (from the scraped
    /// description, as a placeholder for later human review); every other
    /// curated field starts empty/false until a curator fills it in.
    pub fn from_scraped(scraped: &ScrapedRecord) -> Self {
        Self {
            app_name: scraped.app_name.clone(),
            category: scraped.category.clone(),
            developer: String::new(),
            security_rating: String::new(),
            permissions: Vec::new(),
            data_access: String::new(),
            verified: false,
            security_notes: scraped.description.clone(),
            source_url: scraped.source_url.clone(),
            privacy_policy_url: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scrape() -> ScrapedRecord {
        ScrapedRecord {
            app_name: "Asana".to_string(),
            source_url: "https://slack.com/apps/A0F7V3571".to_string(),
            description: "Tasks without leaving Slack".to_string(),
            category: "project-management".to_string(),
        }
    }

    #[test]
    fn dedup_key_is_case_insensitive() {
        let mut scraped = sample_scrape();
        scraped.app_name = "AsAnA".to_string();
        assert_eq!(scraped.dedup_key(), "asana");
        assert_eq!(CuratedRecord::from_scraped(&scraped).dedup_key(), "asana");
    }

    #[test]
    fn scrape_created_records_start_with_safe_defaults() {
        let record = CuratedRecord::from_scraped(&sample_scrape());
        assert!(!record.verified);
        assert!(record.permissions.is_empty());
        assert!(record.developer.is_empty());
        assert!(record.security_rating.is_empty());
        assert!(record.data_access.is_empty());
        assert!(record.privacy_policy_url.is_empty());
        assert_eq!(record.security_notes, "Tasks without leaving Slack");
        assert_eq!(record.source_url, "https://slack.com/apps/A0F7V3571");
        assert_eq!(record.category, "project-management");
    }

    #[test]
    fn curated_record_serializes_with_interchange_key_order() {
        let record = CuratedRecord::from_scraped(&sample_scrape());
        let json = serde_json::to_string(&record).unwrap();
        let keys = [
            "app_name",
            "category",
            "developer",
            "security_rating",
            "permissions",
            "data_access",
            "verified",
            "security_notes",
            "source_url",
            "privacy_policy_url",
        ];
        let mut last = 0;
        for key in keys {
            let needle = format!("\"{key}\":");
            let pos = json.find(&needle).unwrap_or_else(|| panic!("missing {key}"));
            assert!(pos >= last, "{key} out of order");
            last = pos;
        }
    }
}
