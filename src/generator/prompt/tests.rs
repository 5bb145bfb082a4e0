use super::*;
use crate::types::outline::CharacterSheets;
use crate::types::request::Genre;
use serde_json::Map;

fn outline(chapters: u32) -> StoryOutline {
    StoryOutline {
        title: "雾港回声".to_string(),
        subtitle: None,
        author_note: "".to_string(),
        one_line_pitch: "一座港口城市的失踪案".to_string(),
        genre: "mystery".to_string(),
        theme: "真相与代价".to_string(),
        tone: "冷峻".to_string(),
        characters: CharacterSheets::default(),
        world_setting: Map::new(),
        plot_structure: Map::new(),
        chapter_outlines: (1..=chapters)
            .map(|i| ChapterOutline {
                index: i,
                title: format!("第{}章", i),
                summary: "概要".to_string(),
                key_events: vec!["事件".to_string()],
                characters_involved: vec![],
                mood: "neutral".to_string(),
                target_word_count: 1000,
            })
            .collect(),
        themes_to_explore: vec![],
        key_symbols: vec![],
        target_readers: "大众读者".to_string(),
    }
}

fn draft(index: u32, text: &str) -> ChapterDraft {
    ChapterDraft::new(index, format!("第{}章", index), text, AgentRole::Writer)
}

#[test]
fn test_system_prompt_carries_language_instruction() {
    let prompt = system_prompt(AgentRole::Editor, &TargetLanguage::English);
    assert!(prompt.starts_with("你是一位经验丰富的文学编辑"));
    assert!(prompt.ends_with(TargetLanguage::English.prompt_instruction()));
}

#[test]
fn test_rolling_summary_without_history() {
    assert_eq!(rolling_summary(&[]), "这是故事的开端。");
}

#[test]
fn test_rolling_summary_keeps_last_two_chapters() {
    let long = "雨".repeat(500);
    let drafts = vec![draft(1, "最早的一章"), draft(2, &long), draft(3, "第三章正文")];

    let summary = rolling_summary(&drafts);
    assert!(!summary.contains("最早的一章"));
    assert!(summary.contains("第2章："));
    assert!(summary.contains("第3章：第三章正文"));
    // 每章最多200字加省略号
    let second_line = summary.lines().next().unwrap();
    assert_eq!(second_line.chars().count(), "第2章：".chars().count() + 200 + 3);
}

#[test]
fn test_writing_prompt_is_bounded_by_history() {
    let outline = outline(10);
    let chapter = outline.chapter(9).unwrap();
    let body = "字".repeat(5000);
    let few: Vec<ChapterDraft> = (1..=2).map(|i| draft(i, &body)).collect();
    let many: Vec<ChapterDraft> = (1..=8).map(|i| draft(i, &body)).collect();

    let short = writing_prompt(&outline, chapter, &few, None);
    let long = writing_prompt(&outline, chapter, &many, None);
    assert_eq!(short.chars().count(), long.chars().count());
    assert!(short.contains("在结尾留下悬念"));
    assert!(short.contains("字数控制在800到1200字之间"));
}

#[test]
fn test_last_chapter_has_no_cliffhanger_requirement() {
    let outline = outline(3);
    let prompt = writing_prompt(&outline, outline.chapter(3).unwrap(), &[], None);
    assert!(!prompt.contains("留下悬念"));
    assert!(prompt.contains("这是故事的开端。"));
}

#[test]
fn test_writing_prompt_includes_base_draft() {
    let outline = outline(3);
    let mut base = draft(1, "上一版的正文");
    base.quality_score = 0.5;
    let prompt = writing_prompt(&outline, outline.chapter(1).unwrap(), &[], Some(&base));
    assert!(prompt.contains("待改进的上一版正文"));
    assert!(prompt.contains("上一版的正文"));
    assert!(prompt.contains("0.50"));
}

#[test]
fn test_planning_prompt_mentions_genre_and_revision_notes() {
    let mut request = GenerationRequest::new("一个关于时间旅行的故事", 6000, 3);
    request.genre = Some(Genre::Scifi);
    let notes = vec!["建议增加更多配角来丰富故事层次".to_string()];

    let prompt = planning_prompt(&request, "{\"type\":\"object\"}", &notes);
    assert!(prompt.contains("一个关于时间旅行的故事"));
    assert!(prompt.contains(Genre::Scifi.profile().description));
    assert!(prompt.contains("恰好3章"));
    assert!(prompt.contains("上一版大纲的问题"));
    assert!(prompt.contains("1. 建议增加更多配角"));

    let first = planning_prompt(&request, "{}", &[]);
    assert!(!first.contains("上一版大纲的问题"));
}

#[test]
fn test_review_prompts_list_their_axes() {
    let outline = outline(3);
    let chapter_prompt = chapter_review_prompt(&draft(1, &"文".repeat(800)), outline.chapter(1));
    for (key, _, _) in CHAPTER_REVIEW_AXES {
        assert!(chapter_prompt.contains(key));
    }
    assert!(chapter_prompt.contains(&format!("{}...", "文".repeat(REVIEW_EXCERPT_CHARS))));

    let outline_prompt = outline_review_prompt(&outline);
    for (key, _, _) in OUTLINE_REVIEW_AXES {
        assert!(outline_prompt.contains(key));
    }
}

#[test]
fn test_word_range_saturates_on_huge_target() {
    let mut outline = outline(3);
    outline.chapter_outlines[0].target_word_count = u32::MAX;
    let prompt = writing_prompt(&outline, &outline.chapter_outlines[0], &[], None);
    assert!(prompt.contains(&format!("字数控制在{}到{}字之间", u32::MAX - 200, u32::MAX)));
}
