use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{call_metadata, call_model, extract_json_block, passed_fraction};
use crate::error::GenerationError;
use crate::generator::context::GeneratorContext;
use crate::generator::prompt;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::GenerationParams;
use crate::types::agent::{AgentPayload, AgentResponse, AgentRole, NextAction};
use crate::types::outline::{ChapterOutline, CharacterSheets, StoryOutline};
use crate::types::request::GenerationRequest;

/// 大纲中必须出现的字段
pub const REQUIRED_FIELDS: [&str; 4] = ["title", "author_note", "characters", "chapter_outlines"];

/// 模型返回的大纲
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutlineReply {
    /// 吸引人的标题
    pub title: String,
    /// 副标题（可选）
    pub subtitle: Option<String>,
    /// 作者的话（100字内）
    pub author_note: String,
    /// 一句话介绍这个故事
    pub one_line_pitch: String,
    /// 具体细分类型
    pub genre: String,
    /// 核心主题
    pub theme: String,
    /// 整体基调
    pub tone: String,
    pub characters: CharacterSheets,
    /// 时间背景、主要地点、氛围、特殊设定、社会背景
    pub world_setting: Map<String, Value>,
    /// 开篇钩子、激励事件、情节点、高潮、结局
    pub plot_structure: Map<String, Value>,
    pub chapter_outlines: Vec<ChapterOutlineReply>,
    pub themes_to_explore: Vec<String>,
    pub key_symbols: Vec<String>,
    pub target_readers: String,
}

/// 模型返回的单章大纲
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ChapterOutlineReply {
    pub chapter_num: Option<u32>,
    pub title: Option<String>,
    pub summary: String,
    pub key_events: Vec<String>,
    pub characters_involved: Vec<String>,
    pub mood: Option<String>,
    pub target_word_count: Option<u32>,
}

/// 单章目标字数相对平均字数的上限倍数
const MAX_TARGET_FACTOR: u32 = 3;

/// 解析后的大纲，保留模型实际给出的章节数
#[derive(Debug)]
pub struct ParsedOutline {
    pub outline: StoryOutline,
    /// 补齐或截断之前的章节数
    pub returned_chapters: usize,
}

/// 嵌入策划提示词的JSON Schema
pub fn outline_schema() -> String {
    let schema = schemars::schema_for!(OutlineReply);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// 解析大纲回复：非JSON返回Parse，缺少必要字段返回OutlineValidation
pub fn parse_outline(
    reply: &str,
    request: &GenerationRequest,
) -> Result<ParsedOutline, GenerationError> {
    let json = extract_json_block(reply)
        .ok_or_else(|| GenerationError::Parse("回复中没有JSON对象".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| GenerationError::Parse(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| GenerationError::Parse("大纲必须是JSON对象".to_string()))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| object.get(*field).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(GenerationError::OutlineValidation(missing.join(", ")));
    }

    let reply: OutlineReply =
        serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?;
    let returned_chapters = reply.chapter_outlines.len();
    Ok(ParsedOutline {
        outline: normalize(reply, request),
        returned_chapters,
    })
}

/// 章节按请求数量补齐或截断并重新编号
fn normalize(reply: OutlineReply, request: &GenerationRequest) -> StoryOutline {
    let words_per_chapter = request.words_per_chapter();
    let mut replies = reply.chapter_outlines.into_iter();
    let chapter_outlines = (1..=request.chapter_count)
        .map(|index| {
            let chapter = replies.next().unwrap_or_default();
            ChapterOutline {
                index,
                title: chapter
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("第{}章", index)),
                summary: chapter.summary,
                key_events: chapter.key_events,
                characters_involved: chapter.characters_involved,
                mood: chapter
                    .mood
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "neutral".to_string()),
                target_word_count: chapter
                    .target_word_count
                    .filter(|w| *w > 0)
                    .map(|w| {
                        w.clamp(
                            words_per_chapter / 2,
                            words_per_chapter.saturating_mul(MAX_TARGET_FACTOR),
                        )
                    })
                    .unwrap_or(words_per_chapter),
            }
        })
        .collect();

    let or_default = |value: String, fallback: &str| {
        if value.trim().is_empty() {
            fallback.to_string()
        } else {
            value
        }
    };

    StoryOutline {
        title: reply.title,
        subtitle: reply.subtitle.filter(|s| !s.trim().is_empty()),
        author_note: reply.author_note,
        one_line_pitch: reply.one_line_pitch,
        genre: or_default(
            reply.genre,
            request.genre.as_ref().map(|g| g.as_str()).unwrap_or("auto"),
        ),
        theme: or_default(reply.theme, &request.theme),
        tone: reply.tone,
        characters: reply.characters,
        world_setting: reply.world_setting,
        plot_structure: reply.plot_structure,
        chapter_outlines,
        themes_to_explore: reply.themes_to_explore,
        key_symbols: reply.key_symbols,
        target_readers: or_default(reply.target_readers, &request.target_audience),
    }
}

/// 大纲质量：五项检查的通过比例，章节数按模型实际给出的计算
pub fn score_outline(outline: &StoryOutline, returned_chapters: usize) -> f64 {
    passed_fraction(&[
        outline.title.chars().count() > 5,
        outline.characters.protagonist.is_some(),
        returned_chapters >= 3,
        outline.plot_structure.len() >= 3,
        outline.themes_to_explore.len() >= 2,
    ])
}

/// 大纲改进建议
pub fn planning_suggestions(outline: &StoryOutline) -> Vec<String> {
    let mut suggestions = Vec::new();
    if outline.title.chars().count() <= 5 {
        suggestions.push("标题过短，建议使用更有辨识度的标题".to_string());
    }
    if outline.characters.protagonist.is_none() {
        suggestions.push("需要明确主角的人物设定".to_string());
    }
    if outline.plot_structure.len() < 3 {
        suggestions.push("情节结构需包含开篇钩子、激励事件、高潮等要素".to_string());
    }
    if outline.subtitle.is_none() {
        suggestions.push("考虑添加一个副标题来更好地概括故事".to_string());
    }
    if outline.characters.supporting.len() < 2 {
        suggestions.push("建议增加更多配角来丰富故事层次".to_string());
    }
    if outline.themes_to_explore.len() < 3 {
        suggestions.push("可以探索更多主题深度".to_string());
    }
    suggestions
}

pub(super) async fn process(
    context: &GeneratorContext,
    request: &GenerationRequest,
    revision_notes: &[String],
) -> Result<AgentResponse, GenerationError> {
    let user_prompt = prompt::planning_prompt(request, &outline_schema(), revision_notes);
    let params = GenerationParams::default()
        .with_temperature(context.config.agent.planner_temperature)
        .with_max_tokens(context.config.llm.max_tokens.max(4000));
    let tag = if revision_notes.is_empty() {
        "大纲策划".to_string()
    } else {
        "大纲修订".to_string()
    };

    let output = call_model(
        context,
        AgentRole::Planner,
        TaskKind::Outline,
        user_prompt,
        params,
        tag,
    )
    .await?;

    let ParsedOutline {
        outline,
        returned_chapters,
    } = parse_outline(&output.text, request)?;
    let quality_score = score_outline(&outline, returned_chapters);
    let suggestions = planning_suggestions(&outline);

    Ok(AgentResponse {
        role: AgentRole::Planner,
        metadata: call_metadata(&output),
        content: output.text,
        quality_score,
        suggestions,
        next_action: NextAction::BeginWriting,
        payload: AgentPayload::Outline(Box::new(outline)),
        token_usage: output.usage,
    })
}
