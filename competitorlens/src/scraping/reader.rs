// Reader gateway strategy: the target rendered to Markdown by a reader service behind a relay
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use common::AcquisitionConfig;

use super::relay::relay_url;
use super::{Fetcher, ScrapedData, Strategy, StrategyOutcome};
use crate::cancel::CancelToken;

pub const READER_TITLE_FALLBACK: &str = "智能提取页面";

/// Reader gateway reached through a CORS relay (relay -> reader -> target).
/// The reader renders the page and returns cleaned Markdown.
pub struct ReaderGateway {
    reader_base: String,
    relay_template: String,
    blocklist_markers: Vec<String>,
    min_chars: usize,
}

impl ReaderGateway {
    pub fn new(
        reader_base: impl Into<String>,
        relay_template: impl Into<String>,
        blocklist_markers: Vec<String>,
        min_chars: usize,
    ) -> Self {
        Self {
            reader_base: reader_base.into(),
            relay_template: relay_template.into(),
            blocklist_markers,
            min_chars,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(
            &config.reader_base,
            &config.reader_relay,
            config.blocklist_markers.clone(),
            config.reader_min_chars,
        )
    }

    /// Full request URL for `target`.
    pub fn gateway_url(&self, target: &str) -> String {
        let reader_url = format!("{}{}", self.reader_base, target);
        relay_url(&self.relay_template, &reader_url)
    }

    /// The first blocklist marker found in `body`, if any. Matching is case-sensitive.
    fn blocked_by<'a>(&'a self, body: &str) -> Option<&'a str> {
        self.blocklist_markers
            .iter()
            .find(|m| !m.is_empty() && body.contains(m.as_str()))
            .map(|m| m.as_str())
    }
}

#[async_trait::async_trait]
impl Strategy for ReaderGateway {
    fn name(&self) -> &str {
        "reader-gateway"
    }

    async fn attempt(&self, fetcher: &Fetcher, target: &str, cancel: &CancelToken) -> StrategyOutcome {
        let gateway = self.gateway_url(target);
        info!(url = %target, "reader: starting gateway fetch");

        let body = match fetcher.get_text(&gateway, cancel).await {
            Err(cancelled) => return StrategyOutcome::Abort(cancelled),
            Ok(Err(e)) => {
                warn!(url = %target, error = %e, "reader: gateway request failed");
                return StrategyOutcome::Fallthrough(format!("gateway request failed: {:#}", e));
            }
            Ok(Ok(body)) => body,
        };

        if let Some(marker) = self.blocked_by(&body) {
            return StrategyOutcome::Fallthrough(format!("gateway body contains block marker '{}'", marker));
        }

        let chars = body.chars().count();
        if chars <= self.min_chars {
            return StrategyOutcome::Fallthrough(format!("gateway body too short ({} chars)", chars));
        }

        info!(url = %target, chars, "reader: gateway returned markdown");
        StrategyOutcome::Acquired(ScrapedData {
            url: target.to_string(),
            title: extract_title(&body).unwrap_or_else(|| READER_TITLE_FALLBACK.to_string()),
            text: body,
        })
    }
}

/// `Title: <value>` on its own line, as emitted by the reader.
pub fn extract_title(markdown: &str) -> Option<String> {
    static TITLE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TITLE_RE
        .get_or_init(|| Regex::new(r"(?m)^Title:\s*(.+)$").ok())
        .as_ref()?;

    re.captures(markdown)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}
