/*!
common/src/lib.rs

Shared configuration types for CompetitorLens.

This file provides:
- Config data structures (deserialized from TOML, every field defaulted)
- An async loader for a TOML config file, with default + override merging
- Credential resolution, performed once at startup and injected downstream
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How over-long input is cut down before it is sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Keep the leading `max_input_chars` characters.
    #[default]
    Head,
    /// Keep most of the head plus the tail of the page (pricing often lives at the bottom).
    HeadTail,
}

/// Remote LLM config (OpenAI-compatible chat completions endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Input budget in characters (not bytes).
    pub max_input_chars: usize,
    pub truncation: TruncationStrategy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
            max_tokens: 1500,
            temperature: 0.3,
            max_input_chars: 20_000,
            truncation: TruncationStrategy::Head,
        }
    }
}

/// Response envelope returned by a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    /// Body is the target page itself.
    Direct,
    /// Body is a JSON object whose `contents` field holds the page.
    Json,
}

/// A generic CORS relay. `template` must contain a `{url}` placeholder which
/// receives the URL-escaped target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub name: String,
    pub template: String,
    pub kind: RelayKind,
}

/// Content acquisition (reader gateway + relays) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Per-request timeout applied to every gateway/relay call.
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Reader service prefix; the normalized target URL is appended verbatim.
    pub reader_base: String,
    /// Relay template wrapping the reader URL.
    pub reader_relay: String,
    /// Case-sensitive markers that flag a reader body as blocked.
    pub blocklist_markers: Vec<String>,
    /// Host keywords of e-commerce platforms known to block automated fetches.
    pub high_defense_domains: Vec<String>,
    pub reader_min_chars: usize,
    pub relay_min_chars: usize,
    pub sanitized_min_chars: usize,
    /// Relays tried in order after the reader gateway.
    pub relays: Vec<RelayConfig>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            user_agent: "CompetitorLens/0.1.0".to_string(),
            reader_base: "https://r.jina.ai/".to_string(),
            reader_relay: "https://corsproxy.io/?{url}".to_string(),
            blocklist_markers: vec!["403 Forbidden".to_string(), "Access Denied".to_string()],
            high_defense_domains: ["amazon", "taobao", "tmall", "jd.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reader_min_chars: 100,
            relay_min_chars: 200,
            sanitized_min_chars: 50,
            relays: vec![
                RelayConfig {
                    name: "corsproxy".to_string(),
                    template: "https://corsproxy.io/?{url}".to_string(),
                    kind: RelayKind::Direct,
                },
                RelayConfig {
                    name: "allorigins".to_string(),
                    template: "https://api.allorigins.win/get?url={url}&disableCache=true".to_string(),
                    kind: RelayKind::Json,
                },
            ],
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Optional directory served under `/static`.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            static_dir: None,
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub acquisition: AcquisitionConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Resolved secrets. Built once at startup and passed to the LLM provider,
/// so nothing downstream reads the process environment.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}

impl Credentials {
    /// Read the API key from the variable named by `llm.api_key_env`.
    pub fn from_env(llm: &LlmConfig) -> Option<Self> {
        Self::from_lookup(llm, |name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::from_env`] with an injectable lookup. Blank values count as missing.
    pub fn from_lookup<F>(llm: &LlmConfig, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(&llm.api_key_env)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|api_key| Credentials { api_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse config");
        assert_eq!(cfg.llm.max_input_chars, 20_000);
        assert_eq!(cfg.llm.truncation, TruncationStrategy::Head);
        assert_eq!(cfg.acquisition.relays.len(), 2);
        assert_eq!(cfg.acquisition.relays[0].kind, RelayKind::Direct);
        assert_eq!(cfg.acquisition.relays[1].kind, RelayKind::Json);
        assert_eq!(cfg.acquisition.reader_min_chars, 100);
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn config_from_string() {
        let toml = r#"
            [llm]
            model = "qwen-turbo"
            truncation = "head_tail"

            [acquisition]
            timeout_seconds = 5

            [[acquisition.relays]]
            name = "only"
            template = "http://relay.local/?u={url}"
            kind = "json"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.llm.model, "qwen-turbo");
        assert_eq!(cfg.llm.api_key_env, "API_KEY");
        assert_eq!(cfg.llm.truncation, TruncationStrategy::HeadTail);
        assert_eq!(cfg.acquisition.timeout_seconds, 5);
        assert_eq!(cfg.acquisition.relays.len(), 1);
        assert_eq!(cfg.acquisition.relays[0].name, "only");
        assert_eq!(cfg.acquisition.blocklist_markers.len(), 2);
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        let mut f = std::fs::File::create(&default_path).expect("create default");
        writeln!(f, "[llm]\nmodel = \"base-model\"\nmax_tokens = 900\n[server]\nport = 9000").expect("write");
        let mut f = std::fs::File::create(&override_path).expect("create override");
        writeln!(f, "[llm]\nmodel = \"override-model\"").expect("write");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");
        assert_eq!(cfg.llm.model, "override-model");
        assert_eq!(cfg.llm.max_tokens, 900);
        assert_eq!(cfg.server.port, 9000);

        let missing = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(&missing), None).await.expect("load");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn credentials_blank_is_missing() {
        let llm = LlmConfig::default();
        assert!(Credentials::from_lookup(&llm, |_| None).is_none());
        assert!(Credentials::from_lookup(&llm, |_| Some("   ".to_string())).is_none());

        let creds = Credentials::from_lookup(&llm, |name| {
            assert_eq!(name, "API_KEY");
            Some("sk-test".to_string())
        })
        .expect("credentials");
        assert_eq!(creds.api_key, "sk-test");
        assert!(!format!("{:?}", creds).contains("sk-test"));
    }
}
