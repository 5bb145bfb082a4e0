//! 基于rig的Provider实现

use anyhow::Result;
use async_trait::async_trait;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};
use std::time::Duration;

use super::error::ProviderError;
use super::pricing::{ModelPricing, pricing_for};
use super::provider::Provider;
use super::types::GenerationParams;
use crate::config::{LLMProvider, ProviderConfig};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DASHSCOPE_COMPATIBLE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const MOONSHOT_BASE_URL: &str = "https://api.moonshot.cn/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    Moonshot(rig::providers::moonshot::Client),
    DeepSeek(rig::providers::deepseek::Client),
    Mistral(rig::providers::mistral::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = |fallback: &str| {
            config
                .api_base_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        match config.provider {
            LLMProvider::OpenAI => {
                let client = rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&base_url(OPENAI_BASE_URL))
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            // 通义千问走DashScope的OpenAI兼容模式
            LLMProvider::Qwen => {
                let client = rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&base_url(DASHSCOPE_COMPATIBLE_URL))
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            LLMProvider::Moonshot => {
                let client = rig::providers::moonshot::Client::builder(&config.api_key)
                    .base_url(&base_url(MOONSHOT_BASE_URL))
                    .build();
                Ok(ProviderClient::Moonshot(client))
            }
            LLMProvider::DeepSeek => {
                let client = rig::providers::deepseek::Client::builder(&config.api_key)
                    .base_url(&base_url(DEEPSEEK_BASE_URL))
                    .build();
                Ok(ProviderClient::DeepSeek(client))
            }
            LLMProvider::Mistral => {
                let client = rig::providers::mistral::Client::builder(&config.api_key).build();
                Ok(ProviderClient::Mistral(client))
            }
            LLMProvider::OpenRouter => {
                let client = rig::providers::openrouter::Client::builder(&config.api_key).build();
                Ok(ProviderClient::OpenRouter(client))
            }
            LLMProvider::Anthropic => {
                let client =
                    rig::providers::anthropic::ClientBuilder::new(&config.api_key).build()?;
                Ok(ProviderClient::Anthropic(client))
            }
            LLMProvider::Gemini => {
                let client = rig::providers::gemini::Client::builder(&config.api_key).build()?;
                Ok(ProviderClient::Gemini(client))
            }
            LLMProvider::Ollama => {
                let client = rig::providers::ollama::Client::builder().build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }

    /// 按本次调用的采样参数创建Agent
    pub fn create_agent(
        &self,
        model: &str,
        system_prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderAgent> {
        let agent = match self {
            ProviderClient::OpenAI(client) => ProviderAgent::OpenAI(
                client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder()
                    .preamble(system_prompt)
                    .max_tokens(params.max_tokens.into())
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::Moonshot(client) => ProviderAgent::Moonshot(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(params.max_tokens.into())
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::DeepSeek(client) => ProviderAgent::DeepSeek(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(params.max_tokens.into())
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::Mistral(client) => ProviderAgent::Mistral(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::OpenRouter(client) => ProviderAgent::OpenRouter(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::Anthropic(client) => ProviderAgent::Anthropic(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(params.max_tokens.into())
                    .temperature(params.temperature)
                    .build(),
            ),
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);

                ProviderAgent::Gemini(
                    client
                        .agent(model)
                        .preamble(system_prompt)
                        .max_tokens(params.max_tokens.into())
                        .temperature(params.temperature)
                        .additional_params(serde_json::to_value(cfg)?)
                        .build(),
                )
            }
            ProviderClient::Ollama(client) => ProviderAgent::Ollama(
                client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(params.max_tokens.into())
                    .temperature(params.temperature)
                    .build(),
            ),
        };
        Ok(agent)
    }
}

/// 统一的Agent枚举
pub enum ProviderAgent {
    OpenAI(Agent<rig::providers::openai::CompletionModel>),
    Mistral(Agent<rig::providers::mistral::CompletionModel>),
    OpenRouter(Agent<rig::providers::openrouter::CompletionModel>),
    Anthropic(Agent<rig::providers::anthropic::completion::CompletionModel>),
    Gemini(Agent<rig::providers::gemini::completion::CompletionModel>),
    Moonshot(Agent<rig::providers::moonshot::CompletionModel>),
    DeepSeek(Agent<rig::providers::deepseek::CompletionModel>),
    Ollama(Agent<rig::providers::ollama::CompletionModel<reqwest::Client>>),
}

impl ProviderAgent {
    /// 执行prompt，错误以字符串形式返回以便统一分类
    pub async fn prompt(&self, prompt: &str) -> Result<String, String> {
        let result = match self {
            ProviderAgent::OpenAI(agent) => agent.prompt(prompt).await,
            ProviderAgent::Moonshot(agent) => agent.prompt(prompt).await,
            ProviderAgent::DeepSeek(agent) => agent.prompt(prompt).await,
            ProviderAgent::Mistral(agent) => agent.prompt(prompt).await,
            ProviderAgent::OpenRouter(agent) => agent.prompt(prompt).await,
            ProviderAgent::Anthropic(agent) => agent.prompt(prompt).await,
            ProviderAgent::Gemini(agent) => agent.prompt(prompt).await,
            ProviderAgent::Ollama(agent) => agent.prompt(prompt).await,
        };
        result.map_err(|e| e.to_string())
    }
}

/// 由配置驱动的远程Provider
pub struct RigProvider {
    name: String,
    model: String,
    kind: LLMProvider,
    long_context: bool,
    timeout: Duration,
    client: ProviderClient,
}

impl RigProvider {
    pub fn new(config: &ProviderConfig, timeout_seconds: u64) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            name: config.name.clone(),
            model: config.model.clone(),
            kind: config.provider.clone(),
            long_context: config.long_context,
            timeout: Duration::from_secs(timeout_seconds),
            client,
        })
    }

    pub fn kind(&self) -> &LLMProvider {
        &self.kind
    }
}

#[async_trait]
impl Provider for RigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_long_context(&self) -> bool {
        self.long_context
    }

    fn pricing(&self) -> ModelPricing {
        pricing_for(&self.kind, &self.model)
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let agent = self
            .client
            .create_agent(&self.model, system_prompt.unwrap_or_default(), params)
            .map_err(|e| ProviderError::Permanent {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, agent.prompt(prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(message)) => Err(ProviderError::classify(&self.name, &message)),
            Err(_) => Err(ProviderError::Timeout {
                provider: self.name.clone(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    fn count_tokens(&self, text: &str) -> usize {
        match self.kind {
            // Claude按字符数的四分之一估算
            LLMProvider::Anthropic => (text.chars().count() as f64 * 0.25) as usize,
            _ => super::utils::estimate_tokens(text),
        }
    }
}
