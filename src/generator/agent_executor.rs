use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::generator::context::GeneratorContext;
use crate::llm::client::routing::TaskKind;
use crate::llm::client::types::{GenerationParams, TokenUsage};
use crate::llm::client::utils::estimate_token_usage;

pub struct AgentExecuteParams {
    pub prompt_sys: String,
    pub prompt_user: String,
    /// 缓存分类；为None时不读写缓存
    pub cache_scope: Option<String>,
    pub log_tag: String,
    pub task: TaskKind,
    pub params: GenerationParams,
}

/// 一次模型调用的产出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutput {
    pub text: String,
    pub provider: String,
    /// 估算的token用量；缓存命中时为零
    pub usage: TokenUsage,
    pub from_cache: bool,
}

/// 缓存键包含日志标签，同一章不同轮次的调用互不复用
fn cache_key(params: &AgentExecuteParams) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{:.2}",
        params.log_tag, params.task, params.prompt_sys, params.prompt_user, params.params.temperature
    )
}

/// 执行一次带缓存、配额与路由的模型调用
pub async fn prompt(
    context: &GeneratorContext,
    params: AgentExecuteParams,
) -> Result<PromptOutput, GenerationError> {
    let user_id = context.user_id.as_deref();
    context.usage.check_token_budget(user_id)?;

    let key = cache_key(&params);
    if let Some(scope) = &params.cache_scope {
        match context.cache_manager.get::<String>(scope, &key).await {
            Ok(Some(cached)) => {
                println!("   ♻️ 使用缓存结果 [{}]", params.log_tag);
                return Ok(PromptOutput {
                    text: cached.data,
                    provider: cached.provider.unwrap_or_else(|| "cache".to_string()),
                    usage: TokenUsage::default(),
                    from_cache: true,
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(tag = %params.log_tag, error = %e, "读取缓存失败"),
        }
    }

    tracing::debug!(tag = %params.log_tag, task = %params.task, "发起模型调用");
    let routed = context
        .router
        .route(
            params.task,
            &params.prompt_user,
            Some(&params.prompt_sys),
            &params.params,
        )
        .await?;

    let input = format!("{}\n{}", params.prompt_sys, params.prompt_user);
    let provider = context.router.get(&routed.provider);
    // 优先使用provider自己的分词计数
    let usage = match provider {
        Some(provider) => TokenUsage::new(
            provider.count_tokens(&input),
            provider.count_tokens(&routed.text),
        ),
        None => estimate_token_usage(&input, &routed.text),
    };
    context.usage.record_tokens(user_id, usage.total_tokens as u64);

    let cost = provider
        .map(|provider| {
            provider
                .pricing()
                .cost(usage.input_tokens, usage.output_tokens)
        })
        .unwrap_or(0.0);
    tracing::debug!(
        tag = %params.log_tag,
        provider = %routed.provider,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        cost,
        "模型调用完成"
    );

    if let Some(scope) = &params.cache_scope {
        if let Err(e) = context
            .cache_manager
            .set_with_tokens(
                scope,
                &key,
                routed.text.clone(),
                usage,
                Some(&routed.provider),
                cost,
            )
            .await
        {
            tracing::warn!(tag = %params.log_tag, error = %e, "写入缓存失败");
        }
    }

    Ok(PromptOutput {
        text: routed.text,
        provider: routed.provider,
        usage,
        from_cache: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::config::{CacheConfig, Config};
    use crate::llm::client::ProviderRouter;
    use crate::llm::client::error::ProviderError;
    use crate::llm::client::pricing::ModelPricing;
    use crate::llm::client::provider::Provider;
    use crate::llm::client::retry::RetryPolicy;
    use crate::llm::client::routing::RoutingConfig;

    /// 每个字符计为一个token的provider
    struct CharTokenProvider;

    #[async_trait]
    impl Provider for CharTokenProvider {
        fn name(&self) -> &str {
            "chars"
        }

        fn model(&self) -> &str {
            "chars-model"
        }

        fn pricing(&self) -> ModelPricing {
            ModelPricing::new(1.0, 1.0)
        }

        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
            _params: &GenerationParams,
        ) -> Result<String, ProviderError> {
            Ok("四个字符".to_string())
        }

        fn count_tokens(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    #[tokio::test]
    async fn test_usage_uses_provider_token_counter() {
        let mut config = Config::default();
        config.cache = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let mut router =
            ProviderRouter::new(RetryPolicy::immediate(1), RoutingConfig::default(), 1);
        router.register("chars", Arc::new(CharTokenProvider), true);
        let context = GeneratorContext::with_router(config, router).for_user(Some("u-1"));

        let output = prompt(
            &context,
            AgentExecuteParams {
                prompt_sys: "系统".to_string(),
                prompt_user: "用户提示".to_string(),
                cache_scope: None,
                log_tag: "测试".to_string(),
                task: TaskKind::Creative,
                params: GenerationParams::default(),
            },
        )
        .await
        .unwrap();

        // "系统\n用户提示" 共7个字符
        assert_eq!(output.usage.input_tokens, 7);
        assert_eq!(output.usage.output_tokens, 4);
        assert_eq!(output.provider, "chars");
        assert!(!output.from_cache);
        assert_eq!(context.usage.token_usage(Some("u-1")), 11);
    }
}
