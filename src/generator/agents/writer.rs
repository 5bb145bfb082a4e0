use super::{call_metadata, call_model, passed_fraction};
use crate::error::GenerationError;
use crate::generator::context::GeneratorContext;
use crate::generator::prompt;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::GenerationParams;
use crate::types::agent::{AgentPayload, AgentResponse, AgentRole, NextAction};
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;
use crate::utils::text::{count_dialogue_markers, count_paragraphs, count_words};

const MAX_WORD_DEVIATION: f64 = 0.2;
const MIN_DIALOGUE_MARKERS: usize = 6;
const MIN_PARAGRAPHS: usize = 5;
const MIN_RAW_CHARS: usize = 500;
/// 正文输出token上限
const MAX_OUTPUT_TOKENS: u32 = 16_000;

/// 章节质量：四项检查的平均值
///
/// 创作与编辑在写作循环中产出的候选稿都用这个指标比较。
pub fn score_chapter(text: &str, target_words: u32) -> f64 {
    let words = count_words(text) as f64;
    let target = f64::from(target_words.max(1));
    passed_fraction(&[
        (words - target).abs() / target <= MAX_WORD_DEVIATION,
        count_dialogue_markers(text) >= MIN_DIALOGUE_MARKERS,
        count_paragraphs(text) >= MIN_PARAGRAPHS,
        text.chars().count() > MIN_RAW_CHARS,
    ])
}

/// 创作建议
pub fn writing_suggestions(text: &str, target_words: u32) -> Vec<String> {
    let words = count_words(text) as f64;
    let target = f64::from(target_words);
    let mut suggestions = Vec::new();
    if words < target * 0.8 {
        suggestions.push(format!("内容偏短，建议扩充至{}字左右", target_words));
    } else if words > target * 1.2 {
        suggestions.push(format!("内容偏长，建议精简至{}字左右", target_words));
    }
    if count_dialogue_markers(text) < 4 {
        suggestions.push("建议增加更多对话来推进情节".to_string());
    }
    if count_paragraphs(text) < MIN_PARAGRAPHS {
        suggestions.push("建议调整段落结构，增加层次感".to_string());
    }
    suggestions
}

pub(super) async fn process(
    context: &GeneratorContext,
    outline: &StoryOutline,
    chapter_index: u32,
    previous: &[ChapterDraft],
    base: Option<&ChapterDraft>,
) -> Result<AgentResponse, GenerationError> {
    let chapter = outline.chapter(chapter_index).ok_or_else(|| {
        GenerationError::PipelineFatal(format!("大纲中不存在第{}章", chapter_index))
    })?;

    let user_prompt = prompt::writing_prompt(outline, chapter, previous, base);
    let max_tokens = chapter
        .target_word_count
        .saturating_mul(2)
        .clamp(context.config.llm.max_tokens, MAX_OUTPUT_TOKENS.max(context.config.llm.max_tokens));
    let params = GenerationParams::default()
        .with_temperature(context.config.agent.writer_temperature)
        .with_max_tokens(max_tokens);
    let iteration = base.map(|b| b.iteration_count + 1).unwrap_or(1);

    let output = call_model(
        context,
        AgentRole::Writer,
        TaskKind::Creative,
        user_prompt,
        params,
        format!("第{}章·创作{}", chapter_index, iteration),
    )
    .await?;

    let text = output.text.trim();
    let mut draft = ChapterDraft::new(chapter_index, chapter.title.clone(), text, AgentRole::Writer);
    draft.iteration_count = iteration;
    draft.quality_score = score_chapter(&draft.text, chapter.target_word_count);

    Ok(AgentResponse {
        role: AgentRole::Writer,
        metadata: call_metadata(&output),
        content: draft.text.clone(),
        quality_score: draft.quality_score,
        suggestions: writing_suggestions(&draft.text, chapter.target_word_count),
        next_action: NextAction::ReviewContent,
        payload: AgentPayload::Draft(Box::new(draft)),
        token_usage: output.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一段指定字数、对话数和段落数的正文
    fn chapter_text(words: usize, quotes: usize, paragraphs: usize) -> String {
        let per_paragraph = words / paragraphs.max(1);
        let mut lines: Vec<String> = (0..paragraphs).map(|_| "字".repeat(per_paragraph)).collect();
        if let Some(first) = lines.first_mut() {
            first.push_str(&"“".repeat(quotes));
        }
        lines.join("\n\n")
    }

    #[test]
    fn test_perfect_chapter() {
        let text = chapter_text(1000, 6, 5);
        assert_eq!(score_chapter(&text, 1000), 1.0);
        assert!(writing_suggestions(&text, 1000).is_empty());
    }

    #[test]
    fn test_short_chapter_fails_length_checks() {
        let text = chapter_text(300, 6, 5);
        // 字数偏差与长度两项不通过
        assert_eq!(score_chapter(&text, 1000), 0.5);
        assert_eq!(
            writing_suggestions(&text, 1000),
            vec!["内容偏短，建议扩充至1000字左右".to_string()]
        );
    }

    #[test]
    fn test_long_flat_chapter() {
        let text = chapter_text(2000, 0, 1);
        assert_eq!(score_chapter(&text, 1000), 0.25);
        assert_eq!(
            writing_suggestions(&text, 1000),
            vec![
                "内容偏长，建议精简至1000字左右".to_string(),
                "建议增加更多对话来推进情节".to_string(),
                "建议调整段落结构，增加层次感".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(score_chapter("", 1000), 0.0);
        assert_eq!(score_chapter("", 0), 0.0);
    }
}
