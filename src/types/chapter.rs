use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::agent::AgentRole;
use crate::utils::text::count_words;

/// 一个被替换掉的历史版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRevision {
    pub text: String,
    pub word_count: u32,
    pub quality_score: f64,
    pub author: AgentRole,
    pub created_at: DateTime<Utc>,
}

/// 章节草稿，历史版本只追加不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDraft {
    pub index: u32,
    pub title: String,
    pub text: String,
    pub word_count: u32,
    pub quality_score: f64,
    pub iteration_count: u32,
    /// 产出当前版本的角色
    pub author: AgentRole,
    pub editor_notes: Option<String>,
    pub history: Vec<DraftRevision>,
}

impl ChapterDraft {
    pub fn new(index: u32, title: impl Into<String>, text: impl Into<String>, author: AgentRole) -> Self {
        let text = text.into();
        Self {
            index,
            title: title.into(),
            word_count: count_words(&text) as u32,
            text,
            quality_score: 0.0,
            iteration_count: 1,
            author,
            editor_notes: None,
            history: Vec::new(),
        }
    }

    /// 当前版本的历史记录形式
    pub fn to_revision(&self) -> DraftRevision {
        DraftRevision {
            text: self.text.clone(),
            word_count: self.word_count,
            quality_score: self.quality_score,
            author: self.author,
            created_at: Utc::now(),
        }
    }

    /// 用新版本替换当前内容，旧版本进入历史
    pub fn supersede(&mut self, next: ChapterDraft) {
        let previous = std::mem::replace(self, next);
        let mut history = previous.history.clone();
        history.extend(std::mem::take(&mut self.history));
        history.push(previous.to_revision());
        self.history = history;
        self.iteration_count = self.iteration_count.max(previous.iteration_count);
    }

    /// 以当前版本为基础生成下一个版本（继承历史）
    pub fn revised(&self, text: impl Into<String>, author: AgentRole) -> ChapterDraft {
        let mut next = ChapterDraft::new(self.index, self.title.clone(), text, author);
        next.iteration_count = self.iteration_count;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_is_computed() {
        let draft = ChapterDraft::new(1, "开端", "他推开门。\n\n\"Hello there\"", AgentRole::Writer);
        assert_eq!(draft.word_count, 6);
        assert_eq!(draft.iteration_count, 1);
        assert!(draft.history.is_empty());
    }

    #[test]
    fn test_supersede_keeps_history_in_order() {
        let mut draft = ChapterDraft::new(2, "t", "first", AgentRole::Writer);
        draft.quality_score = 0.25;

        let second = draft.revised("second version", AgentRole::Editor);
        draft.supersede(second);
        let third = draft.revised("third", AgentRole::Writer);
        draft.supersede(third);

        assert_eq!(draft.text, "third");
        assert_eq!(draft.history.len(), 2);
        assert_eq!(draft.history[0].text, "first");
        assert_eq!(draft.history[0].quality_score, 0.25);
        assert_eq!(draft.history[1].text, "second version");
        assert_eq!(draft.history[1].author, AgentRole::Editor);
    }
}
