use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::llm::client::types::TokenUsage;
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;

/// 协作角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planner,
    Writer,
    Editor,
    Reviewer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Writer => "writer",
            AgentRole::Editor => "editor",
            AgentRole::Reviewer => "reviewer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Planner => "策划师",
            AgentRole::Writer => "创作者",
            AgentRole::Editor => "编辑",
            AgentRole::Reviewer => "评审者",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 角色给出的下一步建议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    BeginWriting,
    ReviewContent,
    FinalReview,
    Accept,
    Revise,
    Rewrite,
}

impl NextAction {
    /// 解析评审返回的recommendation字段，无法识别时视为需要修改
    pub fn from_recommendation(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "accept" => NextAction::Accept,
            "rewrite" => NextAction::Rewrite,
            _ => NextAction::Revise,
        }
    }
}

/// 评审报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    /// 各维度得分（1-5）
    pub scores: BTreeMap<String, f64>,
    pub overall_score: Option<f64>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub recommendation: NextAction,
    /// 回复无法解析时为true，此时得分为固定的兜底值
    pub fallback: bool,
}

/// 随响应一起返回的结构化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentPayload {
    Outline(Box<StoryOutline>),
    Draft(Box<ChapterDraft>),
    Review(ReviewReport),
}

/// 角色的统一响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub role: AgentRole,
    /// 模型返回的原始文本
    pub content: String,
    pub quality_score: f64,
    pub suggestions: Vec<String>,
    pub next_action: NextAction,
    pub metadata: Map<String, Value>,
    pub payload: AgentPayload,
    /// 本次调用估算的token用量（缓存命中时为0）
    pub token_usage: TokenUsage,
}

impl AgentResponse {
    pub fn outline(&self) -> Option<&StoryOutline> {
        match &self.payload {
            AgentPayload::Outline(outline) => Some(outline),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&ChapterDraft> {
        match &self.payload {
            AgentPayload::Draft(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn into_draft(self) -> Option<ChapterDraft> {
        match self.payload {
            AgentPayload::Draft(draft) => Some(*draft),
            _ => None,
        }
    }

    pub fn review(&self) -> Option<&ReviewReport> {
        match &self.payload {
            AgentPayload::Review(report) => Some(report),
            _ => None,
        }
    }
}

/// 协作日志中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationRecord {
    pub role: AgentRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// 只追加的协作日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollaborationLog {
    records: Vec<CollaborationRecord>,
}

impl CollaborationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: AgentRole, message: impl Into<String>) {
        self.records.push(CollaborationRecord {
            role,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CollaborationRecord] {
        &self.records
    }

    pub fn count_by_role(&self, role: AgentRole) -> usize {
        self.records.iter().filter(|r| r.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_parsing() {
        assert_eq!(NextAction::from_recommendation("Accept"), NextAction::Accept);
        assert_eq!(NextAction::from_recommendation(" rewrite "), NextAction::Rewrite);
        assert_eq!(NextAction::from_recommendation("maybe"), NextAction::Revise);
    }

    #[test]
    fn test_collaboration_log_is_ordered() {
        let mut log = CollaborationLog::new();
        log.push(AgentRole::Planner, "大纲完成");
        log.push(AgentRole::Writer, "第1章完成");
        log.push(AgentRole::Writer, "第2章完成");

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[0].role, AgentRole::Planner);
        assert_eq!(log.count_by_role(AgentRole::Writer), 2);
        assert!(log.records()[0].timestamp <= log.records()[2].timestamp);

        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
    }
}
