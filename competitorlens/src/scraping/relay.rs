// Proxy relay strategy: generic CORS relays tried in order, HTML handed to the sanitizer
use anyhow::{Context, Result as AnyResult};
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{AcquisitionConfig, RelayConfig, RelayKind};

use super::sanitize::{sanitize_html, SANITIZED_TITLE_FALLBACK};
use super::{Fetcher, ScrapedData, Strategy, StrategyOutcome};
use crate::cancel::CancelToken;

/// Substitute the URL-escaped `target` into a relay template's `{url}` placeholder.
pub fn relay_url(template: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    template.replace("{url}", &encoded)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    contents: Option<String>,
}

/// Extract the page HTML from a JSON-envelope relay response.
fn decode_envelope(body: &str) -> AnyResult<String> {
    let envelope: Envelope = serde_json::from_str(body).context("relay returned invalid JSON envelope")?;
    Ok(envelope.contents.unwrap_or_default())
}

/// Prioritized list of generic CORS relays, followed by local sanitization of
/// whatever HTML they produced.
pub struct RelayList {
    relays: Vec<RelayConfig>,
    min_chars: usize,
    sanitized_min_chars: usize,
}

impl RelayList {
    pub fn new(relays: Vec<RelayConfig>, min_chars: usize, sanitized_min_chars: usize) -> Self {
        Self {
            relays,
            min_chars,
            sanitized_min_chars,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(
            config.relays.clone(),
            config.relay_min_chars,
            config.sanitized_min_chars,
        )
    }
}

#[async_trait::async_trait]
impl Strategy for RelayList {
    fn name(&self) -> &str {
        "proxy-relays"
    }

    async fn attempt(&self, fetcher: &Fetcher, target: &str, cancel: &CancelToken) -> StrategyOutcome {
        // Last non-empty body seen; used even when below the threshold if nothing better turns up.
        let mut html: Option<String> = None;
        let mut last_error: Option<anyhow::Error> = None;

        for relay in &self.relays {
            let proxy_url = relay_url(&relay.template, target);
            info!(relay = %relay.name, url = %proxy_url, "relay: trying");

            let body = match fetcher.get_text(&proxy_url, cancel).await {
                Err(cancelled) => return StrategyOutcome::Abort(cancelled),
                Ok(Err(e)) => {
                    warn!(relay = %relay.name, error = %e, "relay: failed");
                    last_error = Some(e);
                    continue;
                }
                Ok(Ok(body)) => body,
            };

            let content = match relay.kind {
                RelayKind::Direct => body,
                RelayKind::Json => match decode_envelope(&body) {
                    Ok(contents) => contents,
                    Err(e) => {
                        warn!(relay = %relay.name, error = %e, "relay: failed");
                        last_error = Some(e);
                        continue;
                    }
                },
            };

            if content.is_empty() {
                debug!(relay = %relay.name, "relay: empty content");
                continue;
            }

            let chars = content.chars().count();
            html = Some(content);
            if chars > self.min_chars {
                info!(relay = %relay.name, chars, "relay: accepted content");
                break;
            }
            debug!(relay = %relay.name, chars, "relay: content below threshold, trying next");
        }

        let Some(html) = html else {
            let reason = match last_error {
                Some(e) => format!("no relay returned content (last error: {:#})", e),
                None => "no relay returned content".to_string(),
            };
            return StrategyOutcome::Fallthrough(reason);
        };

        match sanitize_html(&html, self.sanitized_min_chars) {
            Ok(page) => StrategyOutcome::Acquired(ScrapedData {
                url: target.to_string(),
                title: page.title.unwrap_or_else(|| SANITIZED_TITLE_FALLBACK.to_string()),
                text: page.text,
            }),
            Err(e) => StrategyOutcome::Abort(e),
        }
    }
}
