use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use common::{Config, Credentials, LlmConfig};

use crate::cancel::CancelToken;
use crate::error::{LensError, Result};
use crate::llm::analyzer::analyze_competitor_text;
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::{AnalysisResult, LlmProvider};
use crate::scraping::{has_http_scheme, AcquisitionChain};

/// Progress of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Idle,
    Fetching,
    Analyzing,
    Success,
    Error,
}

/// What the user submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    Url(String),
    Text(String),
}

/// Decide whether `raw` is a URL to acquire or text to analyze directly.
pub fn classify_input(raw: &str) -> Result<AnalysisInput> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LensError::InvalidInput("请输入商品链接 URL 或页面文本内容。".to_string()));
    }

    if !trimmed.contains(char::is_whitespace) && looks_like_url(trimmed) {
        return Ok(AnalysisInput::Url(trimmed.to_string()));
    }
    // Pasted text is forwarded as-is, whitespace included.
    Ok(AnalysisInput::Text(raw.to_string()))
}

/// URL-shaped: an ASCII host (before any `/`, `?` or `#`) that either follows an
/// http(s) scheme or contains a dot.
fn looks_like_url(candidate: &str) -> bool {
    let with_scheme = has_http_scheme(candidate);
    let rest = if with_scheme {
        candidate.splitn(2, "://").nth(1).unwrap_or("")
    } else {
        candidate
    };

    let authority = rest.split(|c: char| matches!(c, '/' | '?' | '#')).next().unwrap_or("");
    let host = authority.rsplit('@').next().unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    // Checked before any parsing: IDNA would map `。` to `.` and accept CJK text.
    if host.is_empty() || !host.is_ascii() {
        return false;
    }

    if with_scheme {
        return url::Url::parse(candidate).is_ok();
    }
    let labels_ok = host
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    host.contains('.') && labels_ok && url::Url::parse(&format!("https://{}", candidate)).is_ok()
}

/// Acquisition + analysis for one input at a time.
pub struct Pipeline {
    chain: AcquisitionChain,
    provider: Arc<dyn LlmProvider>,
    llm_config: LlmConfig,
    status: watch::Sender<AnalysisStatus>,
}

impl Pipeline {
    pub fn new(chain: AcquisitionChain, provider: Arc<dyn LlmProvider>, llm_config: LlmConfig) -> Self {
        let (status, _) = watch::channel(AnalysisStatus::Idle);
        Self {
            chain,
            provider,
            llm_config,
            status,
        }
    }

    /// Build from configuration. Missing credentials fail here, before any network call.
    pub fn from_config(config: &Config, credentials: Option<Credentials>) -> Result<Self> {
        let credentials =
            credentials.ok_or_else(|| LensError::missing_credential(&config.llm.api_key_env))?;
        let provider = RemoteLlmProvider::from_config(&config.llm, &credentials);
        let chain = AcquisitionChain::from_config(&config.acquisition)?;
        Ok(Self::new(chain, Arc::new(provider), config.llm.clone()))
    }

    /// Observe status transitions.
    pub fn subscribe(&self) -> watch::Receiver<AnalysisStatus> {
        self.status.subscribe()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.chain.strategy_names()
    }

    /// Classify `raw` and analyze it.
    pub async fn run(&self, raw: &str, cancel: &CancelToken) -> Result<AnalysisResult> {
        match classify_input(raw) {
            Ok(input) => self.run_input(input, cancel).await,
            Err(e) => self.finish(Err(e)),
        }
    }

    /// Analyze an already classified input. `Text` never touches the acquisition chain.
    pub async fn run_input(&self, input: AnalysisInput, cancel: &CancelToken) -> Result<AnalysisResult> {
        let outcome = self.run_inner(input, cancel).await;
        self.finish(outcome)
    }

    fn finish(&self, outcome: Result<AnalysisResult>) -> Result<AnalysisResult> {
        match &outcome {
            Ok(result) => {
                info!(company = %result.company_name, "pipeline: analysis complete");
                self.set_status(AnalysisStatus::Success);
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "pipeline: analysis failed");
                self.set_status(AnalysisStatus::Error);
            }
        }
        outcome
    }

    async fn run_inner(&self, input: AnalysisInput, cancel: &CancelToken) -> Result<AnalysisResult> {
        let text = match input {
            AnalysisInput::Url(url) => {
                self.set_status(AnalysisStatus::Fetching);
                let scraped = self.chain.acquire(&url, cancel).await?;
                info!(url = %scraped.url, title = %scraped.title, "pipeline: page acquired");
                scraped.text
            }
            AnalysisInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(LensError::InvalidInput("页面文本内容为空。".to_string()));
                }
                info!(chars = text.chars().count(), "pipeline: analyzing pasted text");
                text
            }
        };

        self.set_status(AnalysisStatus::Analyzing);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LensError::Cancelled),
            res = analyze_competitor_text(self.provider.as_ref(), &self.llm_config, &text) => res,
        }
    }

    fn set_status(&self, status: AnalysisStatus) {
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_urls() {
        assert_eq!(
            classify_input("  taobao.com/item/123 ").unwrap(),
            AnalysisInput::Url("taobao.com/item/123".to_string())
        );
        assert_eq!(
            classify_input("https://example.com").unwrap(),
            AnalysisInput::Url("https://example.com".to_string())
        );
        assert_eq!(
            classify_input("HTTP://Example.com/x").unwrap(),
            AnalysisInput::Url("HTTP://Example.com/x".to_string())
        );
    }

    #[test]
    fn classify_text() {
        let pasted = "Acme sells anvils. Pricing: contact sales.";
        assert_eq!(classify_input(pasted).unwrap(), AnalysisInput::Text(pasted.to_string()));
        assert_eq!(
            classify_input("localhost").unwrap(),
            AnalysisInput::Text("localhost".to_string())
        );
        assert_eq!(
            classify_input("某品牌旗舰店").unwrap(),
            AnalysisInput::Text("某品牌旗舰店".to_string())
        );
    }

    #[test]
    fn classify_cjk_text_without_spaces() {
        for pasted in [
            "某品牌旗舰店。专注高端铁砧。终身保修。",
            "Acme是全球领先的铁砧制造商。我们提供终身保修，价格实惠。",
            "官网：acme.com。欢迎访问",
            "https://某品牌。旗舰店",
        ] {
            assert_eq!(
                classify_input(pasted).unwrap(),
                AnalysisInput::Text(pasted.to_string()),
                "{}",
                pasted
            );
        }
    }

    #[test]
    fn classify_host_shapes() {
        assert_eq!(
            classify_input("http://localhost:8000/p").unwrap(),
            AnalysisInput::Url("http://localhost:8000/p".to_string())
        );
        assert_eq!(
            classify_input("item.jd.com/100.html?x=1#top").unwrap(),
            AnalysisInput::Url("item.jd.com/100.html?x=1#top".to_string())
        );
        assert_eq!(
            classify_input("acme..com").unwrap(),
            AnalysisInput::Text("acme..com".to_string())
        );
        assert_eq!(classify_input("v1.2!").unwrap(), AnalysisInput::Text("v1.2!".to_string()));
    }

    #[test]
    fn classify_empty_is_invalid() {
        assert!(matches!(classify_input(" \n\t"), Err(LensError::InvalidInput(_))));
    }

    #[test]
    fn from_config_without_credentials_is_configuration_error() {
        let config = Config::default();
        let err = Pipeline::from_config(&config, None).err().expect("must fail");
        assert!(matches!(err, LensError::Configuration(_)));
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn status_serializes_like_the_ui_enum() {
        assert_eq!(serde_json::to_string(&AnalysisStatus::Analyzing).unwrap(), "\"ANALYZING\"");
    }
}
