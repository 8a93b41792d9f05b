//! Polite single-request page fetching for the directory crawl.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

pub const CRATE_NAME: &str = "appvet-fetch";

/// Fixed identifying user agent sent with every directory request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; appvet-crawler/0.1; +https://github.com/appvet/appvet)";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Classified result of fetching one listing page.
///
/// Callers decide what a non-success outcome means; the fetcher itself
/// never retries. During a crawl any failure simply ends that category's
/// pagination.
#[derive(Debug)]
pub enum FetchOutcome {
    /// HTTP 200 with the response body.
    Body(String),
    /// Any non-200 status code.
    HttpStatus(u16),
    /// DNS, connect, or timeout failure before a status was available.
    Transport(reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(agent) = std::env::var("APPVET_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        config
    }
}

/// Seam between the crawler and the network; tests substitute an
/// in-memory implementation serving canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> FetchOutcome;
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> FetchOutcome {
        debug!(url, "fetching listing page");
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status != StatusCode::OK {
                    return FetchOutcome::HttpStatus(status.as_u16());
                }
                match resp.text().await {
                    Ok(body) => FetchOutcome::Body(body),
                    Err(err) => FetchOutcome::Transport(err),
                }
            }
            Err(err) => FetchOutcome::Transport(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_identifies_the_crawler() {
        let config = FetchConfig::default();
        assert!(config.user_agent.contains("appvet-crawler"));
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn http_fetcher_builds_from_default_config() {
        assert!(HttpFetcher::new(FetchConfig::default()).is_ok());
    }
}
