use crate::config::Config;
use crate::error::GenerationError;
use crate::generator::agents::{AgentInput, ReviewTarget, RoleAgent};
use crate::generator::context::GeneratorContext;
use crate::generator::task::{InMemoryTaskRepository, TaskStatusSink, TaskTracker};
use crate::llm::client::types::TokenUsage;
use crate::types::agent::{AgentResponse, AgentRole, CollaborationLog, NextAction};
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;
use crate::types::request::GenerationRequest;
use crate::types::result::{GenerationStats, NovelResult};
use crate::types::task::{Task, TaskStatus};

use anyhow::Result;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Option<std::time::Instant>,
    phase_start_times: HashMap<String, std::time::Instant>,
    phase_durations: HashMap<String, Duration>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            phase_start_times: HashMap::new(),
            phase_durations: HashMap::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), std::time::Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        if let Some(start_time) = self.phase_start_times.remove(phase_name) {
            let duration = start_time.elapsed();
            self.phase_durations
                .insert(phase_name.to_string(), duration);
            Some(duration)
        } else {
            None
        }
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    /// 获取所有阶段的执行时间
    pub fn get_phase_durations(&self) -> &HashMap<String, Duration> {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = String::new();

        if let Some(total_duration) = self.get_total_duration() {
            report.push_str(&format!(
                "总执行时间: {:.2}秒\n",
                total_duration.as_secs_f64()
            ));
        }

        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for phase in TimingKeys::get_all_phase_keys() {
                if let Some(duration) = self.phase_durations.get(phase) {
                    report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
                }
            }
        }

        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const PLANNING: &'static str = "planning";
    pub const WRITING: &'static str = "writing";
    pub const REVIEWING: &'static str = "reviewing";
    pub const POLISHING: &'static str = "polishing";

    /// 获取所有阶段的键列表
    pub fn get_all_phase_keys() -> Vec<&'static str> {
        vec![
            Self::PLANNING,
            Self::WRITING,
            Self::REVIEWING,
            Self::POLISHING,
        ]
    }
}

/// 写作阶段的进度区间
const WRITING_PROGRESS_START: u32 = 25;
const WRITING_PROGRESS_SPAN: u32 = 40;

/// 第`index`章开始创作时的进度
pub fn writing_progress(index: u32, chapter_count: u32) -> u8 {
    let span = (index.saturating_sub(1)) * WRITING_PROGRESS_SPAN / chapter_count.max(1);
    (WRITING_PROGRESS_START + span).min(100) as u8
}

/// 得分最高的候选，同分取较晚产生的
pub fn best_candidate(candidates: &[ChapterDraft]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, draft)| match best {
            Some((_, score)) if draft.quality_score < score => best,
            _ => Some((i, draft.quality_score)),
        })
        .map(|(i, _)| i)
}

/// 以选中的候选为最终稿，其余候选按产生顺序进入历史
fn settle(mut candidates: Vec<ChapterDraft>, chosen: usize) -> Option<ChapterDraft> {
    if chosen >= candidates.len() {
        return None;
    }
    let mut accepted = candidates.remove(chosen);
    accepted.history = candidates.iter().map(ChapterDraft::to_revision).collect();
    Some(accepted)
}

/// 多智能体协作的生成编排器
pub struct GenerationOrchestrator {
    context: GeneratorContext,
    sink: Arc<dyn TaskStatusSink>,
}

impl GenerationOrchestrator {
    pub fn new(context: GeneratorContext, sink: Arc<dyn TaskStatusSink>) -> Self {
        Self { context, sink }
    }

    pub fn context(&self) -> &GeneratorContext {
        &self.context
    }

    /// 校验请求并登记任务，不合法或超出配额的请求不会产生任务
    pub async fn submit(&self, request: &GenerationRequest) -> Result<Task, GenerationError> {
        request.validate()?;
        self.context
            .usage
            .check_rate_limit(request.user_id.as_deref())?;

        let task = Task::new();
        if let Err(e) = self.sink.publish(&task).await {
            tracing::warn!(task_id = %task.id, error = %e, "任务状态发布失败");
        }
        tracing::info!(task_id = %task.id, theme = %request.theme, "任务已提交");
        Ok(task)
    }

    /// 执行任务直到完成或失败，返回终态的任务
    pub async fn run(&self, task: Task, request: &GenerationRequest) -> Task {
        let context = self.context.for_user(request.user_id.as_deref());
        let mut tracker = TaskTracker::new(task, self.sink.clone());

        let outcome = Pipeline::new(&context, request).execute(&mut tracker).await;
        match outcome {
            Ok(result) => {
                tracing::info!(task_id = %tracker.task().id, title = %result.title, "生成完成");
                tracker.complete(result).await;
            }
            Err(e) => {
                eprintln!("❌ 生成失败: {}", e);
                tracing::error!(task_id = %tracker.task().id, error = %e, "生成失败");
                tracker.fail(e.to_string()).await;
            }
        }
        tracker.into_task()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Task, GenerationError> {
        let task = self.submit(request).await?;
        Ok(self.run(task, request).await)
    }
}

/// 单个任务的执行状态
struct Pipeline<'a> {
    context: &'a GeneratorContext,
    request: &'a GenerationRequest,
    log: CollaborationLog,
    timing: TimingScope,
    tokens: TokenUsage,
    metadata: Map<String, Value>,
}

impl<'a> Pipeline<'a> {
    fn new(context: &'a GeneratorContext, request: &'a GenerationRequest) -> Self {
        Self {
            context,
            request,
            log: CollaborationLog::new(),
            timing: TimingScope::new(),
            tokens: TokenUsage::default(),
            metadata: Map::new(),
        }
    }

    async fn execute(&mut self, tracker: &mut TaskTracker) -> Result<NovelResult, GenerationError> {
        tracker
            .advance(TaskStatus::Planning, 10, "正在设计故事大纲")
            .await;
        self.timing.start_phase(TimingKeys::PLANNING);
        let outline = self.plan(tracker).await?;
        self.timing.end_phase(TimingKeys::PLANNING);

        self.timing.start_phase(TimingKeys::WRITING);
        let mut chapters = self.write_chapters(&outline, tracker).await?;
        self.timing.end_phase(TimingKeys::WRITING);

        tracker
            .advance(TaskStatus::Reviewing, 80, "正在进行最终评审")
            .await;
        self.timing.start_phase(TimingKeys::REVIEWING);
        let reviews = self.review(&outline, &chapters).await?;
        self.timing.end_phase(TimingKeys::REVIEWING);

        self.timing.start_phase(TimingKeys::POLISHING);
        self.polish(&outline, &mut chapters, &reviews, tracker).await?;
        self.timing.end_phase(TimingKeys::POLISHING);

        Ok(self.finish(outline, chapters))
    }

    /// 调用一个角色并累计token用量
    async fn execute_agent(
        &mut self,
        agent: RoleAgent,
        input: AgentInput<'_>,
    ) -> Result<AgentResponse, GenerationError> {
        println!("🤖 执行 {} 智能体...", agent.role().display_name());
        let response = agent.process(self.context, input).await?;
        self.tokens.add(response.token_usage);
        Ok(response)
    }

    async fn plan(&mut self, tracker: &mut TaskTracker) -> Result<StoryOutline, GenerationError> {
        let request = self.request;
        let first = self
            .execute_agent(
                RoleAgent::Planner,
                AgentInput::Plan {
                    request,
                    revision_notes: &[],
                },
            )
            .await?;
        self.log.push(
            AgentRole::Planner,
            format!("完成故事大纲设计，质量评分：{:.2}", first.quality_score),
        );

        let mut chosen = first;
        if chosen.quality_score < self.context.config.agent.planning_threshold {
            tracker
                .advance(TaskStatus::Planning, 15, "大纲质量不足，正在修订")
                .await;
            let notes = chosen.suggestions.clone();
            match self
                .execute_agent(
                    RoleAgent::Planner,
                    AgentInput::Plan {
                        request,
                        revision_notes: &notes,
                    },
                )
                .await
            {
                Ok(revised) => {
                    self.log.push(
                        AgentRole::Planner,
                        format!("完成大纲修订，质量评分：{:.2}", revised.quality_score),
                    );
                    chosen = revised;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "大纲修订失败，沿用首版大纲");
                }
            }
        }
        self.metadata
            .insert("outline_score".to_string(), json!(chosen.quality_score));

        let outline = chosen
            .outline()
            .cloned()
            .ok_or_else(|| GenerationError::PipelineFatal("策划未返回大纲".to_string()))?;
        println!("✓ 大纲《{}》完成，共{}章", outline.title, outline.chapter_count());

        if self.context.config.agent.review_outline {
            let review = self
                .execute_agent(
                    RoleAgent::Reviewer,
                    AgentInput::Review(ReviewTarget::Outline(&outline)),
                )
                .await?;
            self.log.push(
                AgentRole::Reviewer,
                format!("完成大纲评审，质量评分：{:.2}", review.quality_score),
            );
            self.metadata.insert(
                "outline_review".to_string(),
                json!({
                    "score": review.quality_score,
                    "suggestions": review.suggestions,
                }),
            );
        }

        Ok(outline)
    }

    async fn write_chapters(
        &mut self,
        outline: &StoryOutline,
        tracker: &mut TaskTracker,
    ) -> Result<Vec<ChapterDraft>, GenerationError> {
        let chapter_count = outline.chapter_count() as u32;
        tracker
            .advance(TaskStatus::Writing, 25, "开始创作章节")
            .await;

        let mut chapters: Vec<ChapterDraft> = Vec::with_capacity(chapter_count as usize);
        for index in 1..=chapter_count {
            tracker
                .advance(
                    TaskStatus::Writing,
                    writing_progress(index, chapter_count),
                    format!("正在创作第{}章", index),
                )
                .await;
            let draft = self.write_chapter(outline, index, &chapters).await?;
            println!(
                "✓ 第{}章完成：{}字，质量评分{:.2}",
                index, draft.word_count, draft.quality_score
            );
            chapters.push(draft);
        }
        Ok(chapters)
    }

    /// 单章的创作-编辑循环
    async fn write_chapter(
        &mut self,
        outline: &StoryOutline,
        index: u32,
        previous: &[ChapterDraft],
    ) -> Result<ChapterDraft, GenerationError> {
        let max_iterations = self.context.config.agent.max_iterations.max(1);
        let threshold = self.context.config.agent.review_threshold;

        let mut candidates: Vec<ChapterDraft> = Vec::new();
        let mut base: Option<ChapterDraft> = None;
        let mut accepted: Option<usize> = None;
        let mut writer_calls = 0;

        for iteration in 1..=max_iterations {
            let response = self
                .execute_agent(
                    RoleAgent::Writer,
                    AgentInput::Write {
                        outline,
                        chapter_index: index,
                        previous,
                        base: base.as_ref(),
                    },
                )
                .await?;
            writer_calls = iteration;
            self.log.push(
                AgentRole::Writer,
                format!(
                    "第{}章创作完成（迭代{}），质量评分：{:.2}",
                    index, iteration, response.quality_score
                ),
            );
            let mut draft = response
                .into_draft()
                .ok_or_else(|| GenerationError::PipelineFatal("创作者未返回章节".to_string()))?;
            draft.iteration_count = iteration;
            let score = draft.quality_score;
            candidates.push(draft);

            if score >= threshold {
                accepted = Some(candidates.len() - 1);
                break;
            }
            if iteration == max_iterations {
                break;
            }

            let Some(latest) = candidates.last() else {
                break;
            };
            let response = self
                .execute_agent(
                    RoleAgent::Editor,
                    AgentInput::Edit {
                        outline,
                        draft: latest,
                    },
                )
                .await?;
            self.log.push(
                AgentRole::Editor,
                format!(
                    "第{}章编辑优化完成（迭代{}），改进评分：{:.2}",
                    index, iteration, response.quality_score
                ),
            );
            let mut edited = response
                .into_draft()
                .ok_or_else(|| GenerationError::PipelineFatal("编辑未返回章节".to_string()))?;
            edited.iteration_count = iteration;
            candidates.push(edited.clone());
            base = Some(edited);
        }

        let chosen = match accepted {
            Some(i) => i,
            None => {
                tracing::info!(chapter = index, "迭代次数用尽，采用得分最高的版本");
                best_candidate(&candidates).unwrap_or(0)
            }
        };
        let mut draft = settle(candidates, chosen)
            .ok_or_else(|| GenerationError::PipelineFatal(format!("第{}章没有可用版本", index)))?;
        draft.iteration_count = writer_calls;
        Ok(draft)
    }

    /// 并发评审所有章节，结果按章节顺序返回
    async fn review(
        &mut self,
        outline: &StoryOutline,
        chapters: &[ChapterDraft],
    ) -> Result<Vec<AgentResponse>, GenerationError> {
        println!("🤖 执行 {} 智能体...", AgentRole::Reviewer.display_name());
        let context = self.context;
        let reviews: Vec<AgentResponse> = stream::iter(chapters.iter().map(|draft| {
            RoleAgent::Reviewer.process(
                context,
                AgentInput::Review(ReviewTarget::Chapter { outline, draft }),
            )
        }))
        .buffered(context.config.agent.max_parallels.max(1))
        .try_collect()
        .await?;

        for (draft, review) in chapters.iter().zip(&reviews) {
            self.tokens.add(review.token_usage);
            self.log.push(
                AgentRole::Reviewer,
                format!(
                    "第{}章最终评审完成，质量评分：{:.2}",
                    draft.index, review.quality_score
                ),
            );
        }
        Ok(reviews)
    }

    /// 评分偏低且建议修改的章节做一次润色，不再复评
    async fn polish(
        &mut self,
        outline: &StoryOutline,
        chapters: &mut [ChapterDraft],
        reviews: &[AgentResponse],
        tracker: &mut TaskTracker,
    ) -> Result<(), GenerationError> {
        let threshold = self.context.config.agent.polish_threshold;
        let targets: Vec<usize> = reviews
            .iter()
            .enumerate()
            .filter(|(_, review)| {
                review.quality_score < threshold && review.next_action == NextAction::Revise
            })
            .map(|(i, _)| i)
            .collect();

        tracker
            .advance(
                TaskStatus::Polishing,
                90,
                format!("正在润色{}个章节", targets.len()),
            )
            .await;

        let context = self.context;
        let polished: Vec<AgentResponse> = {
            let drafts: &[ChapterDraft] = chapters;
            stream::iter(targets.iter().map(|&i| {
                RoleAgent::Editor.process(
                    context,
                    AgentInput::Edit {
                        outline,
                        draft: &drafts[i],
                    },
                )
            }))
            .buffered(context.config.agent.max_parallels.max(1))
            .try_collect()
            .await?
        };

        for (&i, response) in targets.iter().zip(polished) {
            self.tokens.add(response.token_usage);
            self.log.push(
                AgentRole::Editor,
                format!(
                    "第{}章润色完成，改进评分：{:.2}",
                    chapters[i].index, response.quality_score
                ),
            );
            let edited = response
                .into_draft()
                .ok_or_else(|| GenerationError::PipelineFatal("编辑未返回章节".to_string()))?;
            chapters[i].supersede(edited);
        }

        let review_summary: Vec<Value> = chapters
            .iter()
            .zip(reviews)
            .enumerate()
            .map(|(i, (draft, review))| {
                json!({
                    "chapter": draft.index,
                    "score": review.quality_score,
                    "recommendation": review.next_action,
                    "fallback": review.review().map(|r| r.fallback).unwrap_or(false),
                    "polished": targets.contains(&i),
                })
            })
            .collect();
        self.metadata
            .insert("reviews".to_string(), Value::Array(review_summary));
        Ok(())
    }

    fn finish(&mut self, outline: StoryOutline, chapters: Vec<ChapterDraft>) -> NovelResult {
        let total_words: u64 = chapters.iter().map(|c| u64::from(c.word_count)).sum();
        let average_chapter_words = total_words / (chapters.len().max(1) as u64);
        let stage_timings = self
            .timing
            .get_phase_durations()
            .iter()
            .map(|(phase, duration)| (phase.clone(), duration.as_secs_f64()))
            .collect();
        let total_time = self
            .timing
            .get_total_duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let genre = self
            .request
            .genre
            .as_ref()
            .map(|g| g.as_str())
            .unwrap_or("auto");
        self.metadata.insert("genre".to_string(), json!(genre));
        self.metadata
            .insert("style".to_string(), json!(self.request.style.as_str()));
        self.metadata
            .insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
        self.metadata
            .insert("agent_collaboration".to_string(), json!(true));
        self.metadata.insert(
            "target_language".to_string(),
            json!(self.context.config.target_language.to_string()),
        );

        println!("\n{}", self.timing.generate_timing_report());

        NovelResult {
            title: outline.title.clone(),
            author_note: outline.author_note.clone(),
            outline,
            chapters,
            metadata: std::mem::take(&mut self.metadata),
            generation_stats: GenerationStats {
                total_time,
                total_words,
                average_chapter_words,
                collaboration_messages: self.log.len(),
                stage_timings,
                estimated_tokens: self.tokens.total_tokens as u64,
            },
            collaboration_log: std::mem::take(&mut self.log),
        }
    }
}

/// 启动小说生成工作流
pub async fn launch(config: &Config, request: &GenerationRequest) -> Result<NovelResult> {
    let context = GeneratorContext::new(config.clone())?;
    if context.router.provider_names().is_empty() {
        anyhow::bail!("没有可用的模型provider，请在配置文件或环境变量中提供API Key");
    }

    // 启动时检查模型连接
    context.router.check_connection().await?;

    let repository = Arc::new(InMemoryTaskRepository::new());
    let orchestrator = GenerationOrchestrator::new(context, repository);
    let task = orchestrator.generate(request).await?;

    if config.verbose {
        let report = orchestrator
            .context()
            .cache_manager
            .generate_performance_report();
        println!(
            "💾 缓存命中率 {:.1}%，节省约 ${:.4}",
            report.hit_rate * 100.0,
            report.cost_saved
        );
    }

    match task.status {
        TaskStatus::Completed => task
            .result
            .map(|result| *result)
            .ok_or_else(|| anyhow::anyhow!("任务已完成但没有结果")),
        _ => Err(anyhow::anyhow!(
            task.error.unwrap_or_else(|| "未知错误".to_string())
        )),
    }
}
