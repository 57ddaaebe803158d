// Competitor analysis: prompt construction, input budget and response parsing
use serde_json::json;
use tracing::{info, warn};

use common::{LlmConfig, TruncationStrategy};

use super::{extract_json_from_text, AnalysisResult, LlmProvider, LlmRequest, ResponseSchema};
use crate::error::{LensError, Result};

const ELISION: &str = "\n……\n";

/// Analyze free text with the configured provider. No retry is attempted.
pub async fn analyze_competitor_text<P: LlmProvider + ?Sized>(
    provider: &P,
    config: &LlmConfig,
    text: &str,
) -> Result<AnalysisResult> {
    let processed = truncate_input(text, config.max_input_chars, config.truncation);
    let prompt = build_prompt(&processed);

    let request = LlmRequest {
        prompt,
        max_tokens: Some(config.max_tokens),
        temperature: Some(config.temperature),
        timeout_seconds: Some(config.timeout_seconds),
        response_schema: Some(ResponseSchema {
            name: "competitor_analysis".to_string(),
            schema: analysis_schema(),
        }),
    };

    let response = provider.generate(request).await?;
    info!(
        model = %response.model,
        total_tokens = response.usage.total_tokens,
        "analysis: model responded"
    );

    parse_analysis(&response.content)
}

/// Parse the raw completion into an [`AnalysisResult`].
pub fn parse_analysis(content: &str) -> Result<AnalysisResult> {
    if content.trim().is_empty() {
        return Err(LensError::empty_model_output());
    }

    let cleaned = extract_json_from_text(content).ok_or_else(|| {
        warn!("analysis: no JSON object in model output");
        LensError::ModelResponse("AI 模型返回的内容不是有效的 JSON，请稍后重试。".to_string())
    })?;

    serde_json::from_str(&cleaned).map_err(|e| {
        warn!("analysis: model JSON does not match schema: {}", e);
        LensError::ModelResponse("AI 模型返回的结果格式无效，请稍后重试。".to_string())
    })
}

/// Cut `text` down to `max_chars` characters.
pub fn truncate_input(text: &str, max_chars: usize, strategy: TruncationStrategy) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    warn!(
        total_chars = total,
        max_chars,
        ?strategy,
        "analysis: input exceeds budget, truncating"
    );

    match strategy {
        TruncationStrategy::Head => text.chars().take(max_chars).collect(),
        TruncationStrategy::HeadTail => {
            let head_len = max_chars * 3 / 4;
            let tail_len = max_chars - head_len;
            let head: String = text.chars().take(head_len).collect();
            let tail: String = text.chars().skip(total - tail_len).collect();
            format!("{}{}{}", head, ELISION, tail)
        }
    }
}

fn build_prompt(content: &str) -> String {
    format!(
        r#"你是一位资深的销售策略专家和竞品分析师。
请分析以下从竞争对手网站抓取的原始内容。

请提取以下结构化信息，并必须使用【简体中文】回答，语言风格专业、干练：
1. **公司或产品名称 (companyName)**: 准确识别品牌名。
2. **执行摘要 (summary)**: 简明扼要地概括该公司是做什么的，以及他们的核心价值主张（最多2句话）。
3. **核心功能列表 (coreFeatures)**: 列出3-5个最关键的产品功能或服务能力。
4. **目标客户群体 (targetAudience)**: 明确他们在向谁销售（例如：中小企业市场部、个人开发者、大型制造企业等）。
5. **独特卖点 (sellingPoints)**: 客户选择他们而不是别人的理由（护城河）。
6. **定价模式 (pricingModel)**: 如果提到，请归纳（如“免费增值”、“按席位订阅”、“定制报价”等）；未提到则填“未公开”。
7. **情感倾向 (sentiment)**: 基于文案风格判断，取值为 Positive / Neutral / Mixed 之一。

只输出一个 JSON 对象，不要输出任何其他内容。

网站原始内容：
"""
{}
"""
"#,
        content
    )
}

/// Output schema declared to the model.
pub fn analysis_schema() -> serde_json::Value {
    let string_list = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "companyName": { "type": "string" },
            "summary": { "type": "string" },
            "coreFeatures": string_list,
            "targetAudience": string_list,
            "sellingPoints": string_list,
            "pricingModel": { "type": "string" },
            "sentiment": { "type": "string", "enum": ["Positive", "Neutral", "Mixed"] }
        },
        "required": ["companyName", "summary", "coreFeatures", "targetAudience", "sellingPoints"]
    })
}
