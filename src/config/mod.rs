use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::i18n::TargetLanguage;
use crate::llm::client::retry::RetryPolicy;
use crate::llm::client::routing::RoutingConfig;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Qwen => write!(f, "qwen"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "qwen" | "dashscope" => Ok(LLMProvider::Qwen),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" | "claude" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl LLMProvider {
    /// 读取API KEY的环境变量名
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LLMProvider::OpenAI => Some("OPENAI_API_KEY"),
            LLMProvider::Qwen => Some("DASHSCOPE_API_KEY"),
            LLMProvider::Moonshot => Some("MOONSHOT_API_KEY"),
            LLMProvider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            LLMProvider::Mistral => Some("MISTRAL_API_KEY"),
            LLMProvider::OpenRouter => Some("OPENROUTER_API_KEY"),
            LLMProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LLMProvider::Gemini => Some("GEMINI_API_KEY"),
            LLMProvider::Ollama => None,
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// 小说的目标语言
    pub target_language: TargetLanguage,

    /// 协作流程配置
    pub agent: AgentConfig,

    /// LLM调用配置
    pub llm: LLMConfig,

    /// 重试策略
    pub retry: RetryPolicy,

    /// 路由策略
    pub routing: RoutingConfig,

    /// 已注册的provider，按顺序注册
    pub providers: Vec<ProviderConfig>,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 用户配额
    pub quota: QuotaConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 协作流程配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// 每章Writer最多迭代次数
    pub max_iterations: u32,

    /// 章节草稿直接接受的质量阈值
    pub review_threshold: f64,

    /// 大纲需要修正的质量阈值
    pub planning_threshold: f64,

    /// 评审后需要润色的质量阈值
    pub polish_threshold: f64,

    /// 评审与润色阶段的并发上限
    pub max_parallels: usize,

    /// 规划完成后是否由Reviewer评审大纲
    pub review_outline: bool,

    pub planner_temperature: f64,
    pub writer_temperature: f64,
    pub editor_temperature: f64,
    pub reviewer_temperature: f64,
}

/// LLM调用配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// 最大tokens
    pub max_tokens: u32,


    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,
}

/// 单个provider的注册配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// 注册名，路由表中引用该名称
    pub name: String,

    /// Provider类型
    pub provider: LLMProvider,

    /// 模型名
    pub model: String,

    /// API KEY，为空时从环境变量读取
    pub api_key: String,

    /// API基地址
    pub api_base_url: Option<String>,

    /// 是否支持长上下文
    pub long_context: bool,

    /// 是否作为默认provider
    pub is_default: bool,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

/// 用户配额配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct QuotaConfig {
    /// 是否启用配额检查
    pub enabled: bool,

    /// 每个窗口内允许提交的任务数
    pub max_tasks_per_window: u64,

    /// 限流窗口（秒）
    pub window_seconds: u64,

    /// 每日token上限，为空表示不限制
    pub daily_token_limit: Option<u64>,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 补全provider配置：缺失的API KEY从环境变量读取；未配置任何provider时按环境变量自动发现
    pub fn resolve_providers(&mut self) {
        self.resolve_providers_with(|key| std::env::var(key).ok());
    }

    pub fn resolve_providers_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.providers.is_empty() {
            self.providers = discover_providers(&lookup);
        }
        for provider in &mut self.providers {
            if provider.api_key.trim().is_empty()
                && let Some(env) = provider.provider.api_key_env()
                && let Some(key) = lookup(env)
            {
                provider.api_key = key;
            }
        }
    }
}

/// 根据已设置的环境变量推断可用provider，注册名与默认路由表一致
pub fn discover_providers<F>(lookup: &F) -> Vec<ProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut providers = Vec::new();
    let mut add = |name: &str, provider: LLMProvider, model: &str, long_context: bool| {
        let Some(env) = provider.api_key_env() else {
            return;
        };
        if let Some(key) = lookup(env).filter(|k| !k.trim().is_empty()) {
            providers.push(ProviderConfig {
                name: name.to_string(),
                provider,
                model: model.to_string(),
                api_key: key,
                api_base_url: None,
                long_context,
                is_default: false,
            });
        }
    };

    add("gpt-4", LLMProvider::OpenAI, "gpt-4", false);
    add("gpt-3.5-turbo", LLMProvider::OpenAI, "gpt-3.5-turbo", false);
    add(
        "claude",
        LLMProvider::Anthropic,
        "claude-3-sonnet-20240229",
        true,
    );
    add("qwen", LLMProvider::Qwen, "qwen-plus", false);
    add(
        "moonshot-v1-128k",
        LLMProvider::Moonshot,
        "moonshot-v1-128k",
        true,
    );
    providers
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            review_threshold: 0.7,
            planning_threshold: 0.6,
            polish_threshold: 0.8,
            max_parallels: 3,
            review_outline: false,
            planner_temperature: 0.7,
            writer_temperature: 0.85,
            editor_temperature: 0.3,
            reviewer_temperature: 0.2,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            timeout_seconds: 300,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".novel-forge/cache"),
            expire_hours: 24,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tasks_per_window: 10,
            window_seconds: 3600,
            daily_token_limit: None,
        }
    }
}
