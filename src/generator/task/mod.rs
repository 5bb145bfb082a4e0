//! 任务状态的发布与查询

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::result::NovelResult;
use crate::types::task::{Task, TaskSnapshot, TaskStatus};

/// 接收任务状态变化的一方
#[async_trait]
pub trait TaskStatusSink: Send + Sync {
    async fn publish(&self, task: &Task) -> Result<()>;
}

/// 丢弃所有状态的sink
pub struct NullSink;

#[async_trait]
impl TaskStatusSink for NullSink {
    async fn publish(&self, _task: &Task) -> Result<()> {
        Ok(())
    }
}

/// 内存中的任务仓库，每次发布整体替换记录
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Arc<Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, task_id: &str) -> Option<Arc<Task>> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// 供轮询方使用的状态快照
    pub async fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.get(task_id).await.map(|task| task.snapshot())
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStatusSink for InMemoryTaskRepository {
    async fn publish(&self, task: &Task) -> Result<()> {
        let record = Arc::new(task.clone());
        self.tasks.write().await.insert(task.id.clone(), record);
        Ok(())
    }
}

/// 单个任务的唯一写入方
pub struct TaskTracker {
    task: Task,
    sink: Arc<dyn TaskStatusSink>,
}

impl TaskTracker {
    pub fn new(task: Task, sink: Arc<dyn TaskStatusSink>) -> Self {
        Self { task, sink }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    /// 推进状态，进度只增不减；终态之后不再变化
    pub async fn advance(&mut self, status: TaskStatus, progress: u8, stage: impl Into<String>) {
        if self.settled() {
            return;
        }
        self.task.status = status;
        self.task.progress = self.task.progress.max(progress.min(100));
        self.task.current_stage = stage.into();
        self.task.updated_at = Utc::now();
        self.publish().await;
    }

    pub async fn complete(&mut self, result: NovelResult) {
        if self.settled() {
            return;
        }
        self.task.result = Some(Box::new(result));
        self.advance(TaskStatus::Completed, 100, "生成完成").await;
    }

    /// 标记失败，已有的中间结果一律丢弃
    pub async fn fail(&mut self, message: impl Into<String>) {
        if self.settled() {
            return;
        }
        self.task.status = TaskStatus::Failed;
        self.task.error = Some(message.into());
        self.task.result = None;
        self.task.current_stage = "生成失败".to_string();
        self.task.updated_at = Utc::now();
        self.publish().await;
    }

    fn settled(&self) -> bool {
        if self.task.status.is_terminal() {
            tracing::debug!(task_id = %self.task.id, status = ?self.task.status, "任务已结束，忽略状态更新");
            return true;
        }
        false
    }

    async fn publish(&self) {
        if let Err(e) = self.sink.publish(&self.task).await {
            tracing::warn!(task_id = %self.task.id, error = %e, "任务状态发布失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskStatusSink for FailingSink {
        async fn publish(&self, _task: &Task) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("sink unavailable")
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let mut tracker = TaskTracker::new(Task::new(), repo.clone());
        let id = tracker.task().id.clone();

        tracker.advance(TaskStatus::Writing, 40, "第2章").await;
        tracker.advance(TaskStatus::Writing, 25, "回退的进度").await;

        let snapshot = repo.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.progress, 40);
        assert_eq!(snapshot.current_stage, "回退的进度");
        assert_eq!(snapshot.status, TaskStatus::Writing);
    }

    #[tokio::test]
    async fn test_snapshots_are_replaced_not_mutated() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let mut tracker = TaskTracker::new(Task::new(), repo.clone());
        let id = tracker.task().id.clone();

        tracker.advance(TaskStatus::Planning, 10, "策划").await;
        let before = repo.get(&id).await.unwrap();
        tracker.fail("大纲格式错误: eof").await;
        let after = repo.get(&id).await.unwrap();

        assert_eq!(before.status, TaskStatus::Planning);
        assert_eq!(after.status, TaskStatus::Failed);
        assert_eq!(after.error.as_deref(), Some("大纲格式错误: eof"));
        assert!(after.result.is_none());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_sink_failures_do_not_interrupt() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let mut tracker = TaskTracker::new(Task::new(), sink.clone());
        tracker.advance(TaskStatus::Planning, 10, "策划").await;
        tracker.advance(TaskStatus::Writing, 25, "创作").await;

        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.task().progress, 25);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let mut tracker = TaskTracker::new(Task::new(), repo.clone());
        let id = tracker.task().id.clone();

        tracker.fail("模型服务调用失败").await;
        tracker.advance(TaskStatus::Writing, 50, "迟到的进度").await;

        let snapshot = repo.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.error.as_deref(), Some("模型服务调用失败"));
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Polishing.is_terminal());
    }
}
