use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::types::agent::CollaborationLog;
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;

/// 生成统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// 总耗时（秒）
    pub total_time: f64,
    pub total_words: u64,
    pub average_chapter_words: u64,
    pub collaboration_messages: usize,
    /// 各阶段耗时（秒）
    pub stage_timings: BTreeMap<String, f64>,
    /// 估算的token消耗
    pub estimated_tokens: u64,
}

/// 最终产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelResult {
    pub title: String,
    pub author_note: String,
    pub outline: StoryOutline,
    pub chapters: Vec<ChapterDraft>,
    pub metadata: Map<String, Value>,
    pub generation_stats: GenerationStats,
    pub collaboration_log: CollaborationLog,
}
