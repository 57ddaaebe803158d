use std::fmt::Write;

use crate::llm::AnalysisResult;

/// Render an analysis as a Markdown report for the terminal.
pub fn render_report(result: &AnalysisResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}", result.company_name);
    let _ = writeln!(out, "竞品分析报告");
    if let Some(pricing) = result.pricing_model.as_deref().filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "\n定价: {}", pricing);
    }
    if let Some(sentiment) = result.sentiment {
        let _ = writeln!(out, "情感倾向: {}", sentiment.label());
    }

    let _ = writeln!(out, "\n## 执行摘要\n\n{}", result.summary);

    push_section(&mut out, "核心功能", &result.core_features);
    push_section(&mut out, "目标客户", &result.target_audience);
    push_section(&mut out, "独特卖点 (USP)", &result.selling_points);

    out
}

fn push_section(out: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(out, "\n## {}\n", heading);
    if items.is_empty() {
        let _ = writeln!(out, "- （未识别）");
        return;
    }
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}
