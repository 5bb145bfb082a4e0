use crate::config::{Config, LLMProvider, ProviderConfig};
use crate::i18n::TargetLanguage;
use crate::types::request::{GenerationRequest, Genre, WritingStyle};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "novel-forge.toml";

/// Novel Forge - 多智能体协作的长篇小说生成引擎
#[derive(Parser, Debug)]
#[command(name = "novel-forge")]
#[command(
    about = "Multi-agent fiction generation engine. A planner, writer, editor and reviewer cooperate to turn a theme into a complete multi-chapter story."
)]
#[command(version)]
pub struct Args {
    /// 故事主题（至少5个字符）
    #[arg(short, long)]
    pub theme: String,

    /// 题材 (urban_romance, mystery, scifi, workplace, fantasy)，不指定时由策划自动判断
    #[arg(short, long)]
    pub genre: Option<String>,

    /// 写作风格 (zhihu, humorous, literary, suspenseful)
    #[arg(short, long, default_value = "zhihu")]
    pub style: String,

    /// 目标总字数
    #[arg(short, long, default_value_t = 10000)]
    pub words: u32,

    /// 章节数
    #[arg(short = 'n', long, default_value_t = 5)]
    pub chapters: u32,

    /// 目标读者
    #[arg(long)]
    pub audience: Option<String>,

    /// 提交任务的用户，用于配额统计
    #[arg(long)]
    pub user_id: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 结果输出路径（JSON）
    #[arg(short, long, default_value = "./novel.json")]
    pub output: PathBuf,

    /// 只使用指定的provider (openai, qwen, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 配合--llm-provider使用的模型名
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 每章最多创作轮次
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// 章节直接通过的质量阈值
    #[arg(long)]
    pub review_threshold: Option<f64>,

    /// 评审与润色阶段的并发上限
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// 策划完成后由评审者评估大纲
    #[arg(long)]
    pub review_outline: bool,

    /// 目标语言 (zh, en, ja, ko, de, fr, ru)
    #[arg(long)]
    pub target_language: Option<String>,

    /// 是否禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);
                if default_config_path.exists() {
                    Config::from_file(&default_config_path).with_context(|| {
                        format!("无法读取默认配置文件 {:?}", default_config_path)
                    })?
                } else {
                    Config::default()
                }
            }
        };

        // 覆盖provider配置
        if let Some(provider_str) = &self.llm_provider {
            let provider = provider_str
                .parse::<LLMProvider>()
                .map_err(|e| anyhow::anyhow!(e))?;
            let Some(model) = self.model.clone() else {
                bail!("使用--llm-provider时必须通过--model指定模型");
            };
            config.providers = vec![ProviderConfig {
                name: provider_str.clone(),
                provider,
                model,
                api_key: self.llm_api_key.clone().unwrap_or_default(),
                api_base_url: self.llm_api_base_url.clone(),
                long_context: false,
                is_default: true,
            }];
        } else if self.llm_api_key.is_some() || self.llm_api_base_url.is_some() {
            eprintln!("⚠️ 警告: --llm-api-key/--llm-api-base-url 需要配合 --llm-provider 使用，已忽略");
        }

        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.agent.max_iterations = max_iterations.max(1);
        }
        if let Some(review_threshold) = self.review_threshold {
            config.agent.review_threshold = review_threshold.clamp(0.0, 1.0);
        }
        if let Some(max_parallels) = self.max_parallels {
            config.agent.max_parallels = max_parallels.max(1);
        }
        if self.review_outline {
            config.agent.review_outline = true;
        }

        // 目标语言配置
        if let Some(target_language_str) = &self.target_language {
            if let Ok(target_language) = target_language_str.parse::<TargetLanguage>() {
                config.target_language = target_language;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的目标语言: {}，使用默认语言 ({})",
                    target_language_str,
                    config.target_language.display_name()
                );
            }
        }

        // 缓存配置
        if self.no_cache {
            config.cache.enabled = false;
        }

        config.verbose = self.verbose;

        Ok(config)
    }

    /// 构建生成请求
    pub fn to_request(&self) -> Result<GenerationRequest> {
        let mut request = GenerationRequest::new(self.theme.clone(), self.words, self.chapters);
        if let Some(genre) = &self.genre {
            request.genre = Some(genre.parse::<Genre>().map_err(|e| anyhow::anyhow!(e))?);
        }
        request.style = self
            .style
            .parse::<WritingStyle>()
            .map_err(|e| anyhow::anyhow!(e))?;
        if let Some(audience) = &self.audience {
            request.target_audience = audience.clone();
        }
        request.user_id = self.user_id.clone();
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests;
