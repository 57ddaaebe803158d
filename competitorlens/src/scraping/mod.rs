//! Content acquisition chain.
//!
//! Turns a user-supplied URL into clean, analyzable text. Strategies are tried
//! strictly in order (reader gateway, then the relay list with local HTML
//! sanitization); each one swallows its own network errors and reports an
//! outcome. When every strategy falls through, the failure is classified by
//! target host so e-commerce platforms get sharper guidance.

use anyhow::{Context, Result as AnyResult};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use common::AcquisitionConfig;

use crate::cancel::CancelToken;
use crate::error::{LensError, Result};

pub mod reader;
pub mod relay;
pub mod sanitize;

pub use reader::ReaderGateway;
pub use relay::RelayList;

/// Text obtained for one URL. Built once, handed to the analyzer, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedData {
    /// Normalized, scheme-prefixed target URL
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Result of one strategy attempt.
#[derive(Debug)]
pub enum StrategyOutcome {
    /// Usable text; the chain stops here.
    Acquired(ScrapedData),
    /// Soft failure; the chain moves on to the next strategy.
    Fallthrough(String),
    /// Hard failure; the chain stops and surfaces this error.
    Abort(LensError),
}

/// One step of the acquisition chain.
#[async_trait::async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// `target` is already normalized.
    async fn attempt(&self, fetcher: &Fetcher, target: &str, cancel: &CancelToken) -> StrategyOutcome;
}

/// Shared HTTP client with the per-request timeout every strategy uses.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> AnyResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, timeout })
    }

    /// GET `url` and return the body of a 2xx response.
    ///
    /// The outer error only carries cancellation; network failures, non-2xx
    /// statuses and timeouts come back as the inner error.
    pub async fn get_text(&self, url: &str, cancel: &CancelToken) -> Result<AnyResult<String>> {
        cancel
            .run(self.timeout, async {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .context("failed to send request")?;

                let status = response.status();
                if !status.is_success() {
                    anyhow::bail!("upstream responded with status: {}", status);
                }

                response.text().await.context("failed to read response body")
            })
            .await
    }
}

/// Ordered fallback chain.
pub struct AcquisitionChain {
    fetcher: Fetcher,
    strategies: Vec<Box<dyn Strategy>>,
    high_defense_domains: Vec<String>,
}

impl AcquisitionChain {
    pub fn new(
        fetcher: Fetcher,
        strategies: Vec<Box<dyn Strategy>>,
        high_defense_domains: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            strategies,
            high_defense_domains,
        }
    }

    /// Reader gateway first, then the configured relays.
    pub fn from_config(config: &AcquisitionConfig) -> AnyResult<Self> {
        let fetcher = Fetcher::new(Duration::from_secs(config.timeout_seconds), &config.user_agent)?;
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(ReaderGateway::from_config(config)),
            Box::new(RelayList::from_config(config)),
        ];
        Ok(Self::new(fetcher, strategies, config.high_defense_domains.clone()))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn acquire(&self, url: &str, cancel: &CancelToken) -> Result<ScrapedData> {
        let target = normalize_url(url);
        if target.is_empty() {
            return Err(LensError::InvalidInput("请输入要分析的网址。".to_string()));
        }

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(LensError::Cancelled);
            }
            info!(url = %target, strategy = strategy.name(), "acquisition: attempting");

            match strategy.attempt(&self.fetcher, &target, cancel).await {
                StrategyOutcome::Acquired(data) => {
                    info!(
                        url = %target,
                        strategy = strategy.name(),
                        chars = data.text.chars().count(),
                        "acquisition: succeeded"
                    );
                    return Ok(data);
                }
                StrategyOutcome::Fallthrough(reason) => {
                    warn!(url = %target, strategy = strategy.name(), %reason, "acquisition: falling back");
                }
                StrategyOutcome::Abort(err) => {
                    warn!(url = %target, strategy = strategy.name(), error = %err, "acquisition: aborted");
                    return Err(err);
                }
            }
        }

        Err(classify_failure(&target, &self.high_defense_domains))
    }
}

/// Trim and default the scheme to https.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// `http://` or `https://`, compared case-insensitively.
pub fn has_http_scheme(candidate: &str) -> bool {
    let prefix = |p: &str| {
        candidate
            .get(..p.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(p))
    };
    prefix("http://") || prefix("https://")
}

/// Whether the host of `url` belongs to a platform known to block automated fetches.
pub fn is_high_defense(url: &str, domains: &[String]) -> bool {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_else(|| url.to_lowercase());
    domains
        .iter()
        .any(|d| !d.is_empty() && host.contains(&d.to_lowercase()))
}

/// Final error once every strategy has fallen through.
pub fn classify_failure(url: &str, domains: &[String]) -> LensError {
    let message = if is_high_defense(url, domains) {
        "即使使用了智能网关，该电商平台（如亚马逊/淘宝）的高级防御系统仍然拦截了请求。\
         为了获取分析结果，请您直接【复制页面商品描述】，使用本工具的“粘贴文本”模式。"
    } else {
        "无法突破该网站的反爬虫机制。请尝试使用【粘贴文本】模式进行分析。"
    };
    LensError::Acquisition(message.to_string())
}
