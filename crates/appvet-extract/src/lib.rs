//! Two-tier content extraction and category discovery for directory pages.
//!
//! Strategy A parses the embedded client-framework JSON payload and sniffs
//! its shape for an app listing array. Strategy B is a selector-based
//! markup fallback used only when A yields nothing, so the extractor keeps
//! working when the directory flips between client- and server-rendered
//! pages.

use std::collections::HashSet;

use appvet_core::ScrapedRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

pub const CRATE_NAME: &str = "appvet-extract";

/// Recursion bound for the embedded-JSON shape search. Anything nested
/// deeper is treated as not containing a listing.
const MAX_JSON_DEPTH: usize = 10;

/// Keys that mark an object as "app-like" when found in an array's first
/// element.
const NAME_MARKER_KEYS: &[&str] = &["name", "app_name", "appName", "title", "listing"];

/// Conventional container keys tried before scanning every object value.
const CONTAINER_KEYS: &[&str] = &["apps", "listings", "items", "results", "integrations"];

const NAME_KEYS: &[&str] = &["name", "app_name", "appName", "title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "short_description", "shortDescription"];
const CATEGORY_KEYS: &[&str] = &["category", "categoryName", "category_name"];
const ID_KEYS: &[&str] = &["id", "appId", "app_id"];
const HREF_KEYS: &[&str] = &["url", "href", "permalink"];

const EMBEDDED_PAYLOAD_SELECTOR: &str = r#"script#__NEXT_DATA__[type="application/json"]"#;

/// Card candidates in priority order; attribute-substring forms survive
/// minor markup class renames.
const CARD_SELECTORS: &[&str] = &[
    "a.app_card",
    "a.integration-card",
    "div.app_card_wrapper a",
    "li[class*='app'] a",
    "article[class*='app']",
    "a[href*='/apps/A']",
    "a[href*='/marketplace/apps/']",
];

const CARD_TITLE_SELECTORS: &[&str] = &[
    ".app_card__title",
    ".integration-card__title",
    "[class*='title']",
    "[class*='name']",
    "h2",
    "h3",
];

const CARD_DESCRIPTION_SELECTORS: &[&str] = &[
    ".app_card__description",
    ".integration-card__description",
    "[class*='description']",
    "p",
];

const CARD_CATEGORY_SELECTORS: &[&str] = &[
    ".app_card__category",
    ".integration-card__category",
    "[class*='category']",
];

/// Converts one fetched page body into candidate records.
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Base path for listing detail pages, used to synthesize a URL from a
    /// bare id.
    pub listing_base: String,
    /// Scheme + host prefixed onto relative hrefs.
    pub site_domain: String,
}

impl Extractor {
    pub fn new(listing_base: impl Into<String>, site_domain: impl Into<String>) -> Self {
        Self {
            listing_base: listing_base.into(),
            site_domain: site_domain.into(),
        }
    }

    /// Extract zero or more candidate records from one page body.
    pub fn extract(&self, body: &str) -> Vec<ScrapedRecord> {
        let document = Html::parse_document(body);
        let records = self.extract_embedded_json(&document);
        if !records.is_empty() {
            return records;
        }
        self.extract_markup_cards(&document)
    }

    /// Strategy A: structured extraction from the embedded JSON payload.
    /// A missing or malformed payload yields no records, not an error.
    fn extract_embedded_json(&self, document: &Html) -> Vec<ScrapedRecord> {
        let Some(payload) = embedded_payload_text(document) else {
            return Vec::new();
        };
        let Ok(data) = serde_json::from_str::<Value>(&payload) else {
            debug!("embedded payload is not valid JSON; falling back to markup");
            return Vec::new();
        };
        let Some(apps) = find_app_array(&data, 0) else {
            return Vec::new();
        };
        apps.iter()
            .filter_map(Value::as_object)
            .filter_map(|obj| self.record_from_object(obj))
            .collect()
    }

    fn record_from_object(&self, obj: &Map<String, Value>) -> Option<ScrapedRecord> {
        let name = first_string_value(obj, NAME_KEYS);
        if name.is_empty() {
            return None;
        }
        let mut href = first_string_value(obj, HREF_KEYS);
        if href.is_empty() {
            let id = first_string_value(obj, ID_KEYS);
            if !id.is_empty() {
                href = format!("{}/{}", self.listing_base, id);
            }
        }
        Some(ScrapedRecord {
            app_name: name,
            source_url: self.absolutize(&href),
            description: first_string_value(obj, DESCRIPTION_KEYS),
            category: first_string_value(obj, CATEGORY_KEYS),
        })
    }

    /// Strategy B: heuristic markup extraction over card-like elements.
    fn extract_markup_cards(&self, document: &Html) -> Vec<ScrapedRecord> {
        let mut seen_nodes = HashSet::new();
        let mut records = Vec::new();
        for selector_text in CARD_SELECTORS {
            let Ok(selector) = Selector::parse(selector_text) else {
                continue;
            };
            for card in document.select(&selector) {
                if !seen_nodes.insert(card.id()) {
                    continue;
                }
                let name = first_selector_text(card, CARD_TITLE_SELECTORS);
                if name.is_empty() {
                    continue;
                }
                let href = card.value().attr("href").unwrap_or_default();
                records.push(ScrapedRecord {
                    app_name: name,
                    source_url: self.absolutize(href),
                    description: first_selector_text(card, CARD_DESCRIPTION_SELECTORS),
                    category: first_selector_text(card, CARD_CATEGORY_SELECTORS),
                });
            }
        }
        records
    }

    /// Prefix the site domain onto relative hrefs; absolute URLs and empty
    /// strings pass through untouched.
    fn absolutize(&self, href: &str) -> String {
        if href.is_empty() || href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.site_domain, href)
        }
    }
}

/// Discover category slugs usable as query filters, in document order with
/// first-occurrence dedup. An empty result is normal; the crawl degrades
/// to its fallback category list.
pub fn discover_categories(body: &str) -> Vec<String> {
    let href_pattern = Regex::new(r#"[?&]category=([^&"']+)"#).unwrap();
    let slug_pattern = Regex::new(r#""(?:category_slug|categorySlug)"\s*:\s*"([^"]+)""#).unwrap();

    let document = Html::parse_document(body);
    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for link in document.select(&selector) {
            let href = link.value().attr("href").unwrap_or_default();
            if let Some(captures) = href_pattern.captures(href) {
                let slug = captures[1].to_string();
                if seen.insert(slug.clone()) {
                    categories.push(slug);
                }
            }
        }
    }

    if let Some(payload) = embedded_payload_text(&document) {
        if let Ok(data) = serde_json::from_str::<Value>(&payload) {
            let raw = data.to_string();
            for captures in slug_pattern.captures_iter(&raw) {
                let slug = captures[1].to_string();
                if seen.insert(slug.clone()) {
                    categories.push(slug);
                }
            }
        }
    }

    categories
}

fn embedded_payload_text(document: &Html) -> Option<String> {
    let selector = Selector::parse(EMBEDDED_PAYLOAD_SELECTOR).ok()?;
    let element = document.select(&selector).next()?;
    let text: String = element.text().collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Depth-bounded recursive search for the first array of app-like objects.
fn find_app_array(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_JSON_DEPTH {
        return None;
    }
    if let Value::Array(items) = value {
        if let Some(Value::Object(first)) = items.first() {
            if NAME_MARKER_KEYS.iter().any(|key| first.contains_key(*key)) {
                return Some(items);
            }
        }
        for item in items {
            if let Some(found) = find_app_array(item, depth + 1) {
                return Some(found);
            }
        }
    }
    if let Value::Object(map) = value {
        for key in CONTAINER_KEYS {
            if let Some(candidate @ Value::Array(items)) = map.get(*key) {
                if !items.is_empty() {
                    if let Some(found) = find_app_array(candidate, depth + 1) {
                        return Some(found);
                    }
                }
            }
        }
        for nested in map.values() {
            if matches!(nested, Value::Object(_) | Value::Array(_)) {
                if let Some(found) = find_app_array(nested, depth + 1) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Ordered candidate-key lookup: first key whose value renders to
/// non-empty text wins.
fn first_string_value(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(value_as_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Ordered selector fallback: the first selector with any match wins and
/// contributes that element's trimmed text.
fn first_selector_text(scope: ElementRef<'_>, selectors: &[&str]) -> String {
    for selector_text in selectors {
        let Ok(selector) = Selector::parse(selector_text) else {
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            return element.text().collect::<String>().trim().to_string();
        }
    }
    String::new()
}
