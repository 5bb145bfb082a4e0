//! LLM客户端 - 在多个可互换的provider之间路由生成请求

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::Config;

pub mod error;
pub mod pricing;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod routing;
pub mod types;
pub mod utils;

use error::{ProviderError, ProviderFailure};
use pricing::round_cost;
use provider::Provider;
use providers::RigProvider;
use retry::RetryPolicy;
use routing::{RouteCandidate, RoutingConfig, TaskKind};
use types::GenerationParams;

/// 默认并行比较时使用的provider数量
const DEFAULT_PARALLEL_FANOUT: usize = 3;

/// 一次路由生成的结果
#[derive(Debug, Clone)]
pub struct RoutedGeneration {
    /// 实际产出结果的provider
    pub provider: String,
    pub text: String,
}

/// Provider路由器
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    /// 注册顺序
    order: Vec<String>,
    default_provider: Option<String>,
    retry_policy: RetryPolicy,
    routing: RoutingConfig,
    max_parallels: usize,
}

impl ProviderRouter {
    pub fn new(retry_policy: RetryPolicy, routing: RoutingConfig, max_parallels: usize) -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            default_provider: None,
            retry_policy,
            routing,
            max_parallels: max_parallels.max(1),
        }
    }

    /// 根据配置创建路由器并注册全部provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut router = Self::new(
            config.retry.clone(),
            config.routing.clone(),
            config.agent.max_parallels,
        );
        for provider_config in &config.providers {
            let provider = RigProvider::new(provider_config, config.llm.timeout_seconds)?;
            tracing::debug!(
                name = %provider_config.name,
                kind = %provider.kind(),
                model = %provider_config.model,
                "注册provider"
            );
            router.register(
                &provider_config.name,
                Arc::new(provider),
                provider_config.is_default,
            );
        }
        Ok(router)
    }

    /// 注册provider；首个注册者成为默认，除非之后的注册显式指定为默认
    ///
    /// 重复注册同名provider会替换实现，但保留原有顺序。
    pub fn register(&mut self, name: &str, provider: Arc<dyn Provider>, is_default: bool) {
        if !self.providers.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.providers.insert(name.to_string(), provider);
        if is_default || self.default_provider.is_none() {
            self.default_provider = Some(name.to_string());
        }
    }

    pub fn provider_names(&self) -> &[String] {
        &self.order
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    pub fn max_parallels(&self) -> usize {
        self.max_parallels
    }

    /// 使用默认provider生成
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let name = self
            .default_provider
            .as_deref()
            .ok_or_else(|| ProviderError::NotRegistered("<default>".to_string()))?;
        self.generate_on(name, prompt, system_prompt, params).await
    }

    /// 使用指定provider生成，瞬时错误按重试策略重试
    pub async fn generate_on(
        &self,
        name: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))?;

        self.retry_policy
            .run(name, || provider.generate(prompt, system_prompt, params))
            .await
    }

    /// 依次尝试候选provider，返回第一个成功结果
    ///
    /// 候选列表为空时按注册顺序尝试全部provider。全部失败时返回携带每次失败原因的聚合错误。
    pub async fn generate_with_fallback(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
        providers: &[String],
    ) -> Result<String, ProviderError> {
        self.fallback_inner(prompt, system_prompt, params, providers)
            .await
            .map(|routed| routed.text)
    }

    async fn fallback_inner(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
        providers: &[String],
    ) -> Result<RoutedGeneration, ProviderError> {
        let candidates: &[String] = if providers.is_empty() {
            &self.order
        } else {
            providers
        };

        let mut failures = Vec::new();
        for name in candidates {
            match self.generate_on(name, prompt, system_prompt, params).await {
                Ok(text) => {
                    return Ok(RoutedGeneration {
                        provider: name.clone(),
                        text,
                    });
                }
                Err(err) => {
                    tracing::warn!(provider = %name, error = %err, "provider调用失败，尝试下一个");
                    failures.push(ProviderFailure {
                        provider: name.clone(),
                        error: Box::new(err),
                    });
                }
            }
        }
        Err(ProviderError::AllFailed(failures))
    }

    /// 按任务类型和prompt长度计算候选顺序
    pub fn candidates_for(&self, task: TaskKind, prompt_chars: usize) -> Vec<String> {
        let registered: Vec<RouteCandidate<'_>> = self
            .order
            .iter()
            .filter_map(|name| {
                self.providers.get(name).map(|p| RouteCandidate {
                    name: name.as_str(),
                    supports_long_context: p.supports_long_context(),
                })
            })
            .collect();
        self.routing.select(
            task,
            prompt_chars,
            &registered,
            self.default_provider.as_deref(),
        )
    }

    /// 按路由策略选择候选并带回退地生成
    pub async fn route(
        &self,
        task: TaskKind,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<RoutedGeneration, ProviderError> {
        let prompt_chars =
            prompt.chars().count() + system_prompt.map(|s| s.chars().count()).unwrap_or(0);
        let candidates = self.candidates_for(task, prompt_chars);
        tracing::debug!(task = %task, ?candidates, "路由生成请求");
        self.fallback_inner(prompt, system_prompt, params, &candidates)
            .await
    }

    /// 并发调用多个provider，单个失败不影响其他调用
    ///
    /// 候选列表为空时取前三个已注册的provider。
    pub async fn generate_parallel(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
        providers: &[String],
    ) -> HashMap<String, Result<String, ProviderError>> {
        let names: Vec<String> = if providers.is_empty() {
            self.order
                .iter()
                .take(DEFAULT_PARALLEL_FANOUT)
                .cloned()
                .collect()
        } else {
            providers.to_vec()
        };

        stream::iter(names.into_iter().map(|name| async move {
            let result = self
                .generate_on(&name, prompt, system_prompt, params)
                .await;
            (name, result)
        }))
        .buffered(self.max_parallels)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
    }

    /// 估算每个provider处理该文本的费用（美元，保留4位小数）
    pub fn estimate_cost(&self, text: &str, expected_output_tokens: usize) -> BTreeMap<String, f64> {
        self.order
            .iter()
            .filter_map(|name| {
                self.providers.get(name).map(|provider| {
                    (
                        name.clone(),
                        round_cost(provider.estimate_cost(text, expected_output_tokens)),
                    )
                })
            })
            .collect()
    }

    /// 检查默认provider连接是否正常
    pub async fn check_connection(&self) -> Result<(), ProviderError> {
        println!("🔄 正在检查模型连接...");
        let params = GenerationParams::default().with_max_tokens(16);
        match self
            .generate("Hello", Some("You are a helpful assistant."), &params)
            .await
        {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests;
