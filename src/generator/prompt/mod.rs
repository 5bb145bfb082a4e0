//! 各角色的提示词构建
//!
//! 大纲中的人物、世界观等块都会被截断到固定长度，前情回顾只保留最近两章，
//! 因此无论小说写到第几章，单次prompt的长度都有上限。

use serde::Serialize;

use crate::i18n::TargetLanguage;
use crate::types::agent::AgentRole;
use crate::types::chapter::ChapterDraft;
use crate::types::outline::{ChapterOutline, StoryOutline};
use crate::types::request::GenerationRequest;
use crate::utils::text::excerpt;

/// 前情回顾覆盖的章节数
pub const SUMMARY_WINDOW: usize = 2;
/// 每章前情回顾截取的字数
pub const SUMMARY_EXCERPT_CHARS: usize = 200;
/// 评审时截取的正文长度
pub const REVIEW_EXCERPT_CHARS: usize = 500;
/// 人物、世界观等结构化块的长度上限
const BLOCK_MAX_CHARS: usize = 3000;

const PLANNER_SYSTEM_PROMPT: &str = r#"你是一位专业的小说策划编辑，具有丰富的故事创作经验。
你的任务是根据用户需求设计完整的故事大纲，包括：
1. 分析用户需求和题材特点
2. 设计引人入胜的故事结构
3. 规划各章节的核心内容
4. 确保故事逻辑性和吸引力

请始终保持专业性，确保大纲具有实际操作价值。"#;

const WRITER_SYSTEM_PROMPT: &str = r#"你是一位才华横溢的小说创作者，擅长各种类型的故事创作。
你的任务是根据提供的大纲创作高质量的小说内容，包括：
1. 丰富的人物刻画
2. 生动的场景描写
3. 流畅的情节推进
4. 符合风格要求的语言

请确保创作的内容引人入胜，符合目标读者的期待。"#;

const EDITOR_SYSTEM_PROMPT: &str = r#"你是一位经验丰富的文学编辑，具有敏锐的文学判断力。
你的任务是审核和优化小说内容，包括：
1. 检查逻辑一致性和时间线
2. 优化语言表达和文字流畅度
3. 调整情节节奏和张力
4. 确保人物性格的一致性

请提供具体的修改建议和优化方案。"#;

const REVIEWER_SYSTEM_PROMPT: &str = r#"你是一位专业的文学评审者，具有客观公正的评价能力。
你的任务是评估小说内容的质量，包括：
1. 故事完整性和逻辑性
2. 人物塑造的深度和可信度
3. 语言表达的质量
4. 整体阅读体验

请给出详细的评价报告和改进建议。"#;

/// 角色的系统提示词，末尾附加目标语言指令
pub fn system_prompt(role: AgentRole, language: &TargetLanguage) -> String {
    let base = match role {
        AgentRole::Planner => PLANNER_SYSTEM_PROMPT,
        AgentRole::Writer => WRITER_SYSTEM_PROMPT,
        AgentRole::Editor => EDITOR_SYSTEM_PROMPT,
        AgentRole::Reviewer => REVIEWER_SYSTEM_PROMPT,
    };
    format!("{}\n\n{}", base, language.prompt_instruction())
}

/// 分段拼装的用户提示词
#[derive(Debug, Default)]
pub struct PromptSections {
    opening: String,
    sections: Vec<(String, String)>,
    closing: String,
}

impl PromptSections {
    pub fn new(opening: impl Into<String>) -> Self {
        Self {
            opening: opening.into(),
            ..Self::default()
        }
    }

    pub fn section(mut self, title: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        if !body.trim().is_empty() {
            self.sections.push((title.to_string(), body));
        }
        self
    }

    pub fn closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = closing.into();
        self
    }

    pub fn build(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.opening.trim());
        prompt.push_str("\n\n");
        for (title, body) in &self.sections {
            prompt.push_str(&format!("**{}：**\n{}\n\n", title, body.trim_end()));
        }
        if !self.closing.is_empty() {
            prompt.push_str(self.closing.trim());
            prompt.push('\n');
        }
        prompt
    }
}

/// 结构化数据转为有长度上限的JSON文本
fn bounded_json<T: Serialize + ?Sized>(value: &T) -> String {
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    if text.chars().count() > BLOCK_MAX_CHARS {
        excerpt(&text, BLOCK_MAX_CHARS)
    } else {
        text
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "无".to_string()
    } else {
        items.join("、")
    }
}

/// 最近两章的前情回顾，没有前文时返回开端提示
pub fn rolling_summary(previous: &[ChapterDraft]) -> String {
    if previous.is_empty() {
        return "这是故事的开端。".to_string();
    }
    let start = previous.len().saturating_sub(SUMMARY_WINDOW);
    previous[start..]
        .iter()
        .map(|chapter| {
            format!(
                "{}：{}",
                chapter.title,
                excerpt(&chapter.text, SUMMARY_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 策划提示词
pub fn planning_prompt(
    request: &GenerationRequest,
    outline_schema: &str,
    revision_notes: &[String],
) -> String {
    let genre_line = match &request.genre {
        Some(genre) => {
            let profile = genre.profile();
            format!("{} - {}", profile.name, profile.description)
        }
        None => "自动判断".to_string(),
    };
    let genre_notes = request
        .genre
        .as_ref()
        .map(|genre| {
            let profile = genre.profile();
            format!(
                "- 人物：{}\n- 情节：{}\n- 语言：{}",
                profile.character, profile.plot, profile.language
            )
        })
        .unwrap_or_default();

    let requirements = format!(
        "- 主题：{}\n- 类型：{}\n- 风格：{}（{}）\n- 目标字数：{}字\n- 章节数：{}章\n- 目标读者：{}",
        request.theme,
        genre_line,
        request.style.display_name(),
        request.style.characteristics().join("、"),
        request.target_word_count,
        request.chapter_count,
        request.target_audience
    );

    let structure = format!(
        "请返回严格的JSON对象，字段遵循以下JSON Schema：\n{}\n\n\
         chapter_outlines需要恰好{}章，chapter_num从1开始，每章target_word_count约为{}；\
         plot_structure包含hook、inciting_incident、plot_points、climax、resolution；\
         target_readers填写\"{}\"。",
        outline_schema,
        request.chapter_count,
        request.words_per_chapter(),
        request.target_audience
    );

    let revision = revision_notes
        .iter()
        .enumerate()
        .map(|(i, note)| format!("{}. {}", i + 1, note))
        .collect::<Vec<_>>()
        .join("\n");

    PromptSections::new("请为以下需求创作一个完整的小说大纲：")
        .section("创作需求", requirements)
        .section("类型特色", genre_notes)
        .section("大纲结构", structure)
        .section("上一版大纲的问题", revision)
        .closing(format!(
            "**创作要求：**\n\
             1. 故事要有强烈的冲突和张力\n\
             2. 人物要立体可信，有成长弧线\n\
             3. 适合{}的阅读习惯\n\
             4. 每章都要有明确的目标和进展\n\
             5. 整体结构要完整且引人入胜\n\n\
             请确保返回的是完整、有效的JSON格式。",
            request.target_audience
        ))
        .build()
}

/// 章节创作提示词；提供base时要求在其基础上改写
pub fn writing_prompt(
    outline: &StoryOutline,
    chapter: &ChapterOutline,
    previous: &[ChapterDraft],
    base: Option<&ChapterDraft>,
) -> String {
    let overview = format!(
        "- 标题：{}\n- 主题：{}\n- 基调：{}\n- 一句话概括：{}",
        outline.title, outline.theme, outline.tone, outline.one_line_pitch
    );
    let chapter_plan = format!(
        "- 章节：{}\n- 概要：{}\n- 关键事件：{}\n- 涉及角色：{}\n- 氛围：{}\n- 目标字数：{}字",
        chapter.title,
        chapter.summary,
        join_or_dash(&chapter.key_events),
        join_or_dash(&chapter.characters_involved),
        chapter.mood,
        chapter.target_word_count
    );

    let is_last = chapter.index as usize >= outline.chapter_count();
    let mut requirements = vec![
        format!(
            "字数控制在{}到{}字之间",
            chapter.target_word_count.saturating_sub(200),
            chapter.target_word_count.saturating_add(200)
        ),
        "保持人物性格的一致性".to_string(),
        "推进主要情节，实现章节目标".to_string(),
        "使用丰富的对话推进剧情（对话比例30-40%）".to_string(),
        "加入感官细节，增强画面感".to_string(),
        format!("保持{}的整体基调", outline.tone),
    ];
    if !is_last {
        requirements.push("在结尾留下悬念".to_string());
    }
    let requirements = requirements
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");

    let mut sections = PromptSections::new(format!(
        "请根据以下信息创作第{}章的内容：",
        chapter.index
    ))
    .section("故事概况", overview)
    .section("人物设定", bounded_json(&outline.characters))
    .section("世界观设定", bounded_json(&outline.world_setting))
    .section("本章大纲", chapter_plan)
    .section("前情回顾", rolling_summary(previous));

    if let Some(base) = base {
        sections = sections.section(
            "待改进的上一版正文",
            format!(
                "以下版本质量评分为{:.2}，请在保留其优点的基础上重写本章：\n{}",
                base.quality_score, base.text
            ),
        );
    }

    sections
        .section("创作要求", requirements)
        .closing("请直接输出章节内容，不要添加任何额外的解释或标记。")
        .build()
}

/// 编辑优化提示词
pub fn editing_prompt(draft: &ChapterDraft, outline: &StoryOutline) -> String {
    let info = format!(
        "- 章节：{}\n- 当前字数：{}\n- 在整体故事中的位置：第{}章，共{}章",
        draft.title,
        draft.word_count,
        draft.index,
        outline.chapter_count()
    );
    let background = format!(
        "- 故事主题：{}\n- 故事基调：{}\n- 主要人物：{}",
        outline.theme,
        outline.tone,
        outline.characters.names().join("、")
    );

    PromptSections::new("请对以下章节内容进行编辑优化：")
        .section("章节信息", info)
        .section("故事背景", background)
        .section("原始内容", draft.text.clone())
        .section(
            "编辑要求",
            "1. 语言优化：删除冗余表达，优化句式，确保语言风格统一\n\
             2. 逻辑检查：情节通顺，时间线一致，人物性格连贯，与前文衔接自然\n\
             3. 对话优化：对话自然生动，符合人物性格，通过对话推进情节\n\
             4. 细节增强：适当添加感官细节，强化氛围，优化场景转换\n\
             5. 可读性提升：控制段落长度，确保节奏适宜，不要大幅删减内容",
        )
        .closing("请直接输出优化后的完整内容，不要添加解释或标记。")
        .build()
}

/// 章节评审的维度（键, 名称, 说明）
pub const CHAPTER_REVIEW_AXES: [(&str, &str, &str); 8] = [
    ("completeness", "内容完整性", "是否完整实现了章节目标"),
    ("plot_progression", "情节推进", "是否有效推进了整体故事"),
    ("character_development", "人物刻画", "人物是否生动可信"),
    ("language_quality", "语言质量", "文字表达是否流畅优美"),
    ("pacing", "节奏把控", "情节节奏是否适宜"),
    ("details", "细节描写", "场景和氛围描写是否生动"),
    ("consistency", "逻辑一致性", "是否与前文保持一致"),
    ("readability", "可读性", "是否符合目标读者口味"),
];

/// 大纲评审的维度
pub const OUTLINE_REVIEW_AXES: [(&str, &str, &str); 5] = [
    ("structure", "结构完整性", "起承转合是否完整"),
    ("characters", "人物设计", "人物是否立体且有成长空间"),
    ("conflict", "冲突张力", "核心冲突是否足够吸引人"),
    ("pacing", "章节节奏", "各章分配是否合理"),
    ("originality", "新颖程度", "设定和情节是否有新意"),
];

fn review_format(axes: &[(&str, &str, &str)]) -> String {
    let dimensions = axes
        .iter()
        .enumerate()
        .map(|(i, (_, name, hint))| format!("{}. **{}**：{}", i + 1, name, hint))
        .collect::<Vec<_>>()
        .join("\n");
    let scores = axes
        .iter()
        .map(|(key, name, _)| format!("        \"{}\": {}评分", key, name))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "请从以下几个维度评分（1-5分）并给出具体建议：\n{}\n\n请返回以下JSON格式的评审报告：\n{{\n    \"overall_score\": 总体评分(1-5),\n    \"scores\": {{\n{}\n    }},\n    \"strengths\": [\"优点1\", \"优点2\"],\n    \"weaknesses\": [\"不足1\", \"不足2\"],\n    \"suggestions\": [\"改进建议1\", \"改进建议2\"],\n    \"recommendation\": \"accept/revise/rewrite\"\n}}",
        dimensions, scores
    )
}

/// 章节评审提示词，正文只截取开头部分
pub fn chapter_review_prompt(draft: &ChapterDraft, chapter: Option<&ChapterOutline>) -> String {
    let goal = chapter
        .map(|c| {
            format!(
                "- 标题：{}\n- 概要：{}\n- 关键事件：{}\n- 目标字数：{}\n- 预期氛围：{}",
                c.title,
                c.summary,
                join_or_dash(&c.key_events),
                c.target_word_count,
                c.mood
            )
        })
        .unwrap_or_default();
    let actual = format!(
        "- 标题：{}\n- 实际字数：{}\n- 内容：{}（内容较长，已截取开头）",
        draft.title,
        draft.word_count,
        excerpt(&draft.text, REVIEW_EXCERPT_CHARS)
    );

    PromptSections::new("请对以下章节内容进行专业评审：")
        .section("章节目标", goal)
        .section("实际内容", actual)
        .section("评审维度", review_format(&CHAPTER_REVIEW_AXES))
        .build()
}

/// 大纲评审提示词
pub fn outline_review_prompt(outline: &StoryOutline) -> String {
    let chapters = outline
        .chapter_outlines
        .iter()
        .map(|c| format!("- 第{}章 {}：{}", c.index, c.title, excerpt(&c.summary, 120)))
        .collect::<Vec<_>>()
        .join("\n");

    PromptSections::new("请对以下小说大纲进行专业评审：")
        .section(
            "故事概况",
            format!(
                "- 标题：{}\n- 主题：{}\n- 基调：{}\n- 一句话概括：{}",
                outline.title, outline.theme, outline.tone, outline.one_line_pitch
            ),
        )
        .section("人物设定", bounded_json(&outline.characters))
        .section("情节结构", bounded_json(&outline.plot_structure))
        .section("章节规划", chapters)
        .section("评审维度", review_format(&OUTLINE_REVIEW_AXES))
        .build()
}

#[cfg(test)]
mod tests;
