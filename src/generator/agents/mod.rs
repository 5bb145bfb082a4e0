//! 四个协作角色：策划、创作、编辑、评审

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::GenerationError;
use crate::generator::agent_executor::{self, AgentExecuteParams, PromptOutput};
use crate::generator::context::GeneratorContext;
use crate::generator::prompt;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::GenerationParams;
use crate::types::agent::{AgentRole, AgentResponse};
use crate::types::chapter::ChapterDraft;
use crate::types::outline::StoryOutline;
use crate::types::request::GenerationRequest;

pub mod editor;
pub mod planner;
pub mod reviewer;
pub mod writer;

static FENCED_JSON: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").ok());

/// 从模型回复中取出JSON对象文本：优先代码块，其次第一个`{`到最后一个`}`
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(re) = FENCED_JSON.as_ref() {
        if let Some(m) = re.captures(text).and_then(|c| c.get(1)) {
            return Some(m.as_str());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 评审对象
#[derive(Debug, Clone, Copy)]
pub enum ReviewTarget<'a> {
    Chapter {
        outline: &'a StoryOutline,
        draft: &'a ChapterDraft,
    },
    Outline(&'a StoryOutline),
}

/// 角色的输入
#[derive(Debug, Clone, Copy)]
pub enum AgentInput<'a> {
    Plan {
        request: &'a GenerationRequest,
        /// 上一版大纲的改进意见，首次策划为空
        revision_notes: &'a [String],
    },
    Write {
        outline: &'a StoryOutline,
        chapter_index: u32,
        previous: &'a [ChapterDraft],
        base: Option<&'a ChapterDraft>,
    },
    Edit {
        outline: &'a StoryOutline,
        draft: &'a ChapterDraft,
    },
    Review(ReviewTarget<'a>),
}

/// 按角色分派的智能体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAgent {
    Planner,
    Writer,
    Editor,
    Reviewer,
}

impl RoleAgent {
    pub fn role(&self) -> AgentRole {
        match self {
            RoleAgent::Planner => AgentRole::Planner,
            RoleAgent::Writer => AgentRole::Writer,
            RoleAgent::Editor => AgentRole::Editor,
            RoleAgent::Reviewer => AgentRole::Reviewer,
        }
    }

    pub async fn process(
        self,
        context: &GeneratorContext,
        input: AgentInput<'_>,
    ) -> Result<AgentResponse, GenerationError> {
        match (self, input) {
            (
                RoleAgent::Planner,
                AgentInput::Plan {
                    request,
                    revision_notes,
                },
            ) => planner::process(context, request, revision_notes).await,
            (
                RoleAgent::Writer,
                AgentInput::Write {
                    outline,
                    chapter_index,
                    previous,
                    base,
                },
            ) => writer::process(context, outline, chapter_index, previous, base).await,
            (RoleAgent::Editor, AgentInput::Edit { outline, draft }) => {
                editor::process(context, outline, draft).await
            }
            (RoleAgent::Reviewer, AgentInput::Review(target)) => {
                reviewer::process(context, target).await
            }
            (agent, _) => Err(GenerationError::PipelineFatal(format!(
                "{}收到了不匹配的输入",
                agent.role().display_name()
            ))),
        }
    }
}

/// 以角色身份调用模型，系统提示词按角色查表
pub(crate) async fn call_model(
    context: &GeneratorContext,
    role: AgentRole,
    task: TaskKind,
    user_prompt: String,
    params: GenerationParams,
    log_tag: String,
) -> Result<PromptOutput, GenerationError> {
    let params = AgentExecuteParams {
        prompt_sys: prompt::system_prompt(role, &context.config.target_language),
        prompt_user: user_prompt,
        cache_scope: Some(role.as_str().to_string()),
        log_tag,
        task,
        params,
    };
    agent_executor::prompt(context, params).await
}

/// 所有响应都带上的调用信息
pub(crate) fn call_metadata(output: &PromptOutput) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("provider".to_string(), Value::from(output.provider.clone()));
    metadata.insert("from_cache".to_string(), Value::from(output.from_cache));
    metadata
}

/// 若干布尔检查通过的比例
pub(crate) fn passed_fraction(checks: &[bool]) -> f64 {
    if checks.is_empty() {
        return 0.0;
    }
    checks.iter().filter(|passed| **passed).count() as f64 / checks.len() as f64
}
