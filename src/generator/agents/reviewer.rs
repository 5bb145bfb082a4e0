use serde_json::Value;
use std::collections::BTreeMap;

use super::{ReviewTarget, call_metadata, call_model, extract_json_block};
use crate::error::GenerationError;
use crate::generator::context::GeneratorContext;
use crate::generator::prompt;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::GenerationParams;
use crate::types::agent::{AgentPayload, AgentResponse, AgentRole, NextAction, ReviewReport};

/// 回复无法解析时的固定得分
pub const FALLBACK_SCORE: f64 = 0.6;
/// 达到该分数视为通过
pub const ACCEPT_SCORE: f64 = 0.7;
const MAX_AXIS_SCORE: f64 = 5.0;

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// 综合得分：各维度平均分/5，无维度时取overall_score/5，都没有时取兜底分
pub fn review_score(report: &ReviewReport) -> f64 {
    let score = if !report.scores.is_empty() {
        report.scores.values().sum::<f64>() / (report.scores.len() as f64 * MAX_AXIS_SCORE)
    } else if let Some(overall) = report.overall_score {
        overall / MAX_AXIS_SCORE
    } else {
        FALLBACK_SCORE
    };
    score.clamp(0.0, 1.0)
}

/// 解析失败时使用的报告
pub fn fallback_report() -> ReviewReport {
    ReviewReport {
        scores: BTreeMap::new(),
        overall_score: None,
        strengths: Vec::new(),
        weaknesses: Vec::new(),
        suggestions: vec!["请重新检查内容格式".to_string()],
        recommendation: NextAction::Revise,
        fallback: true,
    }
}

/// 解析评审回复并给出得分，无法解析时退回兜底报告而不是报错
pub fn parse_review(reply: &str) -> (ReviewReport, f64) {
    let parsed = extract_json_block(reply)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .filter(Value::is_object);
    let Some(value) = parsed else {
        tracing::warn!("评审结果无法解析，使用默认评分");
        return (fallback_report(), FALLBACK_SCORE);
    };

    let scores: BTreeMap<String, f64> = value
        .get("scores")
        .and_then(Value::as_object)
        .map(|axes| {
            axes.iter()
                .filter_map(|(axis, score)| score.as_f64().map(|s| (axis.clone(), s)))
                .collect()
        })
        .unwrap_or_default();

    let mut report = ReviewReport {
        scores,
        overall_score: value.get("overall_score").and_then(Value::as_f64),
        strengths: string_list(value.get("strengths")),
        weaknesses: string_list(value.get("weaknesses")),
        suggestions: string_list(value.get("suggestions")),
        recommendation: NextAction::Revise,
        fallback: false,
    };
    let score = review_score(&report);
    report.recommendation = if score >= ACCEPT_SCORE {
        NextAction::Accept
    } else {
        NextAction::Revise
    };
    (report, score)
}

pub(super) async fn process(
    context: &GeneratorContext,
    target: ReviewTarget<'_>,
) -> Result<AgentResponse, GenerationError> {
    let (user_prompt, tag, mode) = match target {
        ReviewTarget::Chapter { outline, draft } => (
            prompt::chapter_review_prompt(draft, outline.chapter(draft.index)),
            format!("第{}章·评审", draft.index),
            "chapter",
        ),
        ReviewTarget::Outline(outline) => (
            prompt::outline_review_prompt(outline),
            "大纲评审".to_string(),
            "outline",
        ),
    };
    let params = GenerationParams::default()
        .with_temperature(context.config.agent.reviewer_temperature)
        .with_max_tokens(context.config.llm.max_tokens);

    let output = call_model(
        context,
        AgentRole::Reviewer,
        TaskKind::Review,
        user_prompt,
        params,
        tag,
    )
    .await?;

    let (report, score) = parse_review(&output.text);
    let mut metadata = call_metadata(&output);
    metadata.insert("mode".to_string(), Value::from(mode));
    metadata.insert("fallback".to_string(), Value::from(report.fallback));
    if let ReviewTarget::Chapter { draft, .. } = target {
        metadata.insert("chapter".to_string(), Value::from(draft.index));
    }

    Ok(AgentResponse {
        role: AgentRole::Reviewer,
        metadata,
        content: output.text,
        quality_score: score,
        suggestions: report.suggestions.clone(),
        next_action: report.recommendation,
        payload: AgentPayload::Review(report),
        token_usage: output.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_mean_of_axes() {
        let reply = r#"{"overall_score": 1, "scores": {"completeness": 4, "pacing": 3, "details": 5, "readability": 4},
            "suggestions": ["加强结尾"], "recommendation": "revise"}"#;
        let (report, score) = parse_review(reply);
        assert!((score - 0.8).abs() < 1e-9);
        assert_eq!(report.recommendation, NextAction::Accept);
        assert_eq!(report.suggestions, vec!["加强结尾".to_string()]);
        assert!(!report.fallback);
    }

    #[test]
    fn test_low_score_means_revise() {
        let reply = "```json\n{\"scores\": {\"structure\": 3, \"characters\": 3, \"conflict\": 3, \"pacing\": 3, \"originality\": 3}}\n```";
        let (report, score) = parse_review(reply);
        assert!((score - 0.6).abs() < 1e-9);
        assert_eq!(report.recommendation, NextAction::Revise);
    }

    #[test]
    fn test_overall_score_when_axes_missing() {
        let (_, score) = parse_review(r#"{"overall_score": 4.5}"#);
        assert!((score - 0.9).abs() < 1e-9);

        let (report, score) = parse_review(r#"{"strengths": ["节奏紧凑"]}"#);
        assert_eq!(score, FALLBACK_SCORE);
        assert_eq!(report.strengths, vec!["节奏紧凑".to_string()]);
    }

    #[test]
    fn test_scores_are_clamped() {
        let (report, score) = parse_review(r#"{"scores": {"a": 9, "b": 8, "c": "great"}}"#);
        assert_eq!(score, 1.0);
        assert_eq!(report.scores.len(), 2);

        let (_, score) = parse_review(r#"{"overall_score": -3}"#);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_unparseable_reply_falls_back() {
        let (report, score) = parse_review("这一章写得很好，我给五星。");
        assert_eq!(score, FALLBACK_SCORE);
        assert_eq!(report.recommendation, NextAction::Revise);
        assert_eq!(report.suggestions, vec!["请重新检查内容格式".to_string()]);
        assert!(report.fallback);

        let (report, _) = parse_review("[1, 2, 3]");
        assert!(report.fallback);
    }
}
