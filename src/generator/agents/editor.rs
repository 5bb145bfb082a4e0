use super::writer::score_chapter;
use super::{call_metadata, call_model, passed_fraction};
use crate::error::GenerationError;
use crate::generator::context::GeneratorContext;
use crate::generator::prompt;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::GenerationParams;
use crate::types::agent::{AgentPayload, AgentResponse, AgentRole, NextAction};
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;
use crate::utils::text::count_paragraphs;

pub const EDITOR_NOTES: &str = "已优化语言表达和结构";
const MAX_WORD_DRIFT: f64 = 0.15;
const MIN_RETAINED_RATIO: f64 = 0.9;
const SHORT_CHAPTER_WORDS: u32 = 800;

/// 编辑质量：相对原稿的三项检查
pub fn score_edit(edited: &ChapterDraft, original: &ChapterDraft) -> f64 {
    let original_words = f64::from(original.word_count.max(1));
    let drift = (f64::from(edited.word_count) - f64::from(original.word_count)).abs() / original_words;
    let original_chars = original.text.chars().count() as f64;
    passed_fraction(&[
        drift <= MAX_WORD_DRIFT,
        count_paragraphs(&edited.text) >= count_paragraphs(&original.text),
        edited.text.chars().count() as f64 >= original_chars * MIN_RETAINED_RATIO,
    ])
}

/// 编辑建议
pub fn editing_suggestions(edited: &ChapterDraft, original: &ChapterDraft) -> Vec<String> {
    let mut suggestions = Vec::new();
    let change = i64::from(edited.word_count) - i64::from(original.word_count);
    if change.unsigned_abs() as f64 > f64::from(original.word_count) * 0.1 {
        if change > 0 {
            suggestions.push(format!("内容增加了{}字，请确认是否合适", change));
        } else {
            suggestions.push(format!("内容减少了{}字，确保信息完整", -change));
        }
    }
    if edited.word_count < SHORT_CHAPTER_WORDS {
        suggestions.push("章节内容偏短，可考虑适当扩充".to_string());
    }
    suggestions
}

pub(super) async fn process(
    context: &GeneratorContext,
    outline: &StoryOutline,
    draft: &ChapterDraft,
) -> Result<AgentResponse, GenerationError> {
    let user_prompt = prompt::editing_prompt(draft, outline);
    let max_tokens = draft
        .word_count
        .saturating_mul(2)
        .max(context.config.llm.max_tokens);
    let params = GenerationParams::default()
        .with_temperature(context.config.agent.editor_temperature)
        .with_max_tokens(max_tokens);

    let output = call_model(
        context,
        AgentRole::Editor,
        TaskKind::Polish,
        user_prompt,
        params,
        format!("第{}章·编辑{}", draft.index, draft.iteration_count),
    )
    .await?;

    let text = output.text.trim();
    let mut edited = if text.is_empty() {
        tracing::warn!(chapter = draft.index, "编辑未返回内容，保留原稿");
        let mut kept = draft.revised(draft.text.clone(), AgentRole::Editor);
        kept.editor_notes = Some("编辑未返回内容，保留原稿".to_string());
        kept
    } else {
        let mut edited = draft.revised(text, AgentRole::Editor);
        edited.editor_notes = Some(EDITOR_NOTES.to_string());
        edited
    };
    let target = outline
        .chapter(draft.index)
        .map(|c| c.target_word_count)
        .unwrap_or(draft.word_count);
    edited.quality_score = score_chapter(&edited.text, target);

    Ok(AgentResponse {
        role: AgentRole::Editor,
        metadata: call_metadata(&output),
        content: output.text,
        quality_score: score_edit(&edited, draft),
        suggestions: editing_suggestions(&edited, draft),
        next_action: NextAction::FinalReview,
        payload: AgentPayload::Draft(Box::new(edited)),
        token_usage: output.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str) -> ChapterDraft {
        ChapterDraft::new(1, "第1章", text, AgentRole::Writer)
    }

    fn paragraphs(count: usize, chars: usize) -> String {
        (0..count)
            .map(|_| "字".repeat(chars))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_conservative_edit_scores_full() {
        let original = draft(&paragraphs(5, 200));
        let edited = draft(&paragraphs(6, 180));
        assert_eq!(score_edit(&edited, &original), 1.0);
        assert!(editing_suggestions(&edited, &original).is_empty());
    }

    #[test]
    fn test_heavy_cut_is_penalized() {
        let original = draft(&paragraphs(5, 200));
        let edited = draft(&paragraphs(3, 200));
        assert_eq!(score_edit(&edited, &original), 0.0);
        assert_eq!(
            editing_suggestions(&edited, &original),
            vec![
                "内容减少了400字，确保信息完整".to_string(),
                "章节内容偏短，可考虑适当扩充".to_string(),
            ]
        );
    }

    #[test]
    fn test_expansion_is_reported() {
        let original = draft(&paragraphs(5, 200));
        let edited = draft(&paragraphs(5, 300));
        // 字数漂移超过15%，其余两项通过
        assert!((score_edit(&edited, &original) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            editing_suggestions(&edited, &original),
            vec!["内容增加了500字，请确认是否合适".to_string()]
        );
    }
}
