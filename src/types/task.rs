use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::result::NovelResult;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Writing,
    Reviewing,
    Polishing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Planning => "planning",
            TaskStatus::Writing => "writing",
            TaskStatus::Reviewing => "reviewing",
            TaskStatus::Polishing => "polishing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 生成任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// 0-100，除失败外单调不减
    pub progress: u8,
    pub current_stage: String,
    pub error: Option<String>,
    pub result: Option<Box<NovelResult>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: TaskStatus::Pending,
            progress: 0,
            current_stage: "等待开始".to_string(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            current_stage: self.current_stage.clone(),
            error: self.error.clone(),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// 对外上报的任务状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_stage: String,
    pub error: Option<String>,
}
