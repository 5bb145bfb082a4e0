//! 按任务类型选择候选provider

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 生成任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Outline,
    Creative,
    Dialogue,
    Polish,
    Review,
    Summary,
    Translate,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Outline => "outline",
            TaskKind::Creative => "creative",
            TaskKind::Dialogue => "dialogue",
            TaskKind::Polish => "polish",
            TaskKind::Review => "review",
            TaskKind::Summary => "summary",
            TaskKind::Translate => "translate",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// 任务类型 -> 有序provider名称列表
    pub table: BTreeMap<String, Vec<String>>,

    /// prompt超过该字符数时优先使用长上下文provider
    pub long_context_threshold: usize,

    /// 长上下文provider的优先顺序
    pub long_context_providers: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let entry = |kind: TaskKind, providers: &[&str]| {
            (
                kind.as_str().to_string(),
                providers.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            )
        };
        Self {
            table: BTreeMap::from([
                entry(TaskKind::Outline, &["claude", "gpt-4"]),
                entry(TaskKind::Creative, &["claude", "gpt-3.5-turbo"]),
                entry(TaskKind::Dialogue, &["gpt-3.5-turbo", "qwen"]),
                entry(TaskKind::Polish, &["claude", "gpt-4"]),
                entry(TaskKind::Review, &["claude", "gpt-4"]),
                entry(TaskKind::Summary, &["gpt-3.5-turbo", "qwen"]),
                entry(TaskKind::Translate, &["gpt-3.5-turbo", "qwen"]),
            ]),
            long_context_threshold: 10_000,
            long_context_providers: vec!["claude".to_string(), "moonshot-v1-128k".to_string()],
        }
    }
}

/// 路由时对单个已注册provider的描述
#[derive(Debug, Clone)]
pub struct RouteCandidate<'a> {
    pub name: &'a str,
    pub supports_long_context: bool,
}

impl RoutingConfig {
    /// 计算候选provider顺序
    ///
    /// `registered`按注册顺序排列。结果只包含已注册的provider，且不重复。
    pub fn select(
        &self,
        task: TaskKind,
        prompt_chars: usize,
        registered: &[RouteCandidate<'_>],
        default_provider: Option<&str>,
    ) -> Vec<String> {
        let is_registered = |name: &str| registered.iter().any(|c| c.name == name);
        let mut ordered: Vec<String> = Vec::new();
        let push = |name: &str, ordered: &mut Vec<String>| {
            if is_registered(name) && !ordered.iter().any(|n| n == name) {
                ordered.push(name.to_string());
            }
        };

        if prompt_chars > self.long_context_threshold {
            for name in &self.long_context_providers {
                push(name, &mut ordered);
            }
            for candidate in registered.iter().filter(|c| c.supports_long_context) {
                push(candidate.name, &mut ordered);
            }
        }

        if let Some(names) = self.table.get(task.as_str()) {
            for name in names {
                push(name, &mut ordered);
            }
        }

        if let Some(default) = default_provider {
            push(default, &mut ordered);
        }

        if ordered.is_empty() {
            ordered = registered.iter().map(|c| c.name.to_string()).collect();
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> Vec<RouteCandidate<'static>> {
        vec![
            RouteCandidate {
                name: "gpt-3.5-turbo",
                supports_long_context: false,
            },
            RouteCandidate {
                name: "qwen",
                supports_long_context: false,
            },
            RouteCandidate {
                name: "claude",
                supports_long_context: true,
            },
        ]
    }

    #[test]
    fn test_table_order_then_default() {
        let routing = RoutingConfig::default();
        let order = routing.select(TaskKind::Outline, 100, &registered(), Some("qwen"));
        assert_eq!(order, vec!["claude".to_string(), "qwen".to_string()]);
    }

    #[test]
    fn test_long_prompt_promotes_long_context_providers() {
        let routing = RoutingConfig::default();
        let order = routing.select(TaskKind::Dialogue, 20_000, &registered(), None);
        assert_eq!(order[0], "claude");
        assert_eq!(order[1], "gpt-3.5-turbo");
        assert_eq!(order[2], "qwen");
    }

    #[test]
    fn test_unknown_names_fall_back_to_registration_order() {
        let mut routing = RoutingConfig::default();
        routing.table.clear();
        let order = routing.select(TaskKind::Creative, 10, &registered(), None);
        assert_eq!(order, vec!["gpt-3.5-turbo", "qwen", "claude"]);
    }
}
