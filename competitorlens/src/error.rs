use thiserror::Error;

/// User-facing error. The `Display` text of every variant is the message shown
/// to the end user, so it is written in the report language.
#[derive(Error, Debug)]
pub enum LensError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Acquisition(String),

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    ModelResponse(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("请求已取消。")]
    Cancelled,

    #[error("分析过程中发生意外错误：{0}")]
    Other(#[from] anyhow::Error),
}

impl LensError {
    /// Stable identifier used by the HTTP API.
    pub fn kind(&self) -> &'static str {
        match self {
            LensError::Configuration(_) => "configuration",
            LensError::Acquisition(_) => "acquisition",
            LensError::Parse(_) => "parse",
            LensError::ModelResponse(_) => "model_response",
            LensError::InvalidInput(_) => "invalid_input",
            LensError::Cancelled => "cancelled",
            LensError::Other(_) => "internal",
        }
    }

    pub fn missing_credential(env_var: &str) -> Self {
        LensError::Configuration(format!("API Key 缺失。请设置 {} 环境变量。", env_var))
    }

    pub fn empty_model_output() -> Self {
        LensError::ModelResponse("AI 模型未能生成分析结果，请稍后重试。".to_string())
    }
}

impl serde::Serialize for LensError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
