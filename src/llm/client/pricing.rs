//! 各provider的计费表（美元 / 1K tokens）

use serde::{Deserialize, Serialize};

use crate::config::LLMProvider;

/// 人民币计价的模型按该汇率折算为美元
const RMB_PER_USD: f64 = 7.2;

/// 模型单价
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// 输入输出同价，且以人民币计价
    const fn flat_rmb(rmb_per_1k: f64) -> Self {
        let usd = rmb_per_1k / RMB_PER_USD;
        Self::new(usd, usd)
    }

    pub const FREE: ModelPricing = ModelPricing::new(0.0, 0.0);

    /// 计算一次调用的费用（美元）
    pub fn cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

// 键越长越具体，按表中顺序优先匹配
const OPENAI_TABLE: &[(&str, ModelPricing)] = &[
    ("gpt-3.5-turbo-16k", ModelPricing::new(0.003, 0.004)),
    ("gpt-3.5-turbo", ModelPricing::new(0.0015, 0.002)),
    ("gpt-4-32k", ModelPricing::new(0.06, 0.12)),
    ("gpt-4", ModelPricing::new(0.03, 0.06)),
];
const OPENAI_DEFAULT: ModelPricing = ModelPricing::new(0.0015, 0.002);

const CLAUDE_TABLE: &[(&str, ModelPricing)] = &[
    ("opus", ModelPricing::new(0.015, 0.075)),
    ("sonnet", ModelPricing::new(0.003, 0.015)),
    ("haiku", ModelPricing::new(0.00025, 0.00125)),
];
const CLAUDE_DEFAULT: ModelPricing = ModelPricing::new(0.003, 0.015);

const QWEN_TABLE: &[(&str, ModelPricing)] = &[
    ("qwen-turbo", ModelPricing::flat_rmb(0.008)),
    ("qwen-plus", ModelPricing::flat_rmb(0.02)),
    ("qwen-max", ModelPricing::flat_rmb(0.12)),
];
const QWEN_DEFAULT: ModelPricing = ModelPricing::flat_rmb(0.008);

const MOONSHOT_TABLE: &[(&str, ModelPricing)] = &[
    ("128k", ModelPricing::flat_rmb(0.060)),
    ("32k", ModelPricing::flat_rmb(0.024)),
    ("8k", ModelPricing::flat_rmb(0.012)),
];
const MOONSHOT_DEFAULT: ModelPricing = ModelPricing::flat_rmb(0.012);

const DEEPSEEK_DEFAULT: ModelPricing = ModelPricing::new(0.00027, 0.0011);

fn lookup(table: &[(&str, ModelPricing)], model: &str, fallback: ModelPricing) -> ModelPricing {
    let model = model.to_lowercase();
    table
        .iter()
        .filter(|(key, _)| model.contains(key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, pricing)| *pricing)
        .unwrap_or(fallback)
}

/// 按provider类型与模型名称（子串匹配）查找单价
pub fn pricing_for(provider: &LLMProvider, model: &str) -> ModelPricing {
    match provider {
        LLMProvider::OpenAI | LLMProvider::Mistral | LLMProvider::OpenRouter | LLMProvider::Gemini => {
            lookup(OPENAI_TABLE, model, OPENAI_DEFAULT)
        }
        LLMProvider::Anthropic => lookup(CLAUDE_TABLE, model, CLAUDE_DEFAULT),
        LLMProvider::Qwen => lookup(QWEN_TABLE, model, QWEN_DEFAULT),
        LLMProvider::Moonshot => lookup(MOONSHOT_TABLE, model, MOONSHOT_DEFAULT),
        LLMProvider::DeepSeek => DEEPSEEK_DEFAULT,
        LLMProvider::Ollama => ModelPricing::FREE,
    }
}

/// 保留4位小数
pub fn round_cost(cost: f64) -> f64 {
    (cost * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_longest_key_wins() {
        let p = pricing_for(&LLMProvider::OpenAI, "gpt-3.5-turbo-16k-0613");
        assert_eq!(p, ModelPricing::new(0.003, 0.004));

        let p = pricing_for(&LLMProvider::OpenAI, "gpt-4-32k");
        assert_eq!(p, ModelPricing::new(0.06, 0.12));

        let p = pricing_for(&LLMProvider::OpenAI, "gpt-4");
        assert_eq!(p, ModelPricing::new(0.03, 0.06));
    }

    #[test]
    fn test_claude_tiers_and_default() {
        let p = pricing_for(&LLMProvider::Anthropic, "claude-3-opus-20240229");
        assert_eq!(p.output_per_1k, 0.075);
        let p = pricing_for(&LLMProvider::Anthropic, "claude-unknown");
        assert_eq!(p, CLAUDE_DEFAULT);
    }

    #[test]
    fn test_rmb_models_are_converted() {
        let p = pricing_for(&LLMProvider::Qwen, "qwen-max");
        assert!((p.input_per_1k - 0.12 / 7.2).abs() < 1e-12);
        let p = pricing_for(&LLMProvider::Moonshot, "moonshot-v1-128k");
        assert!((p.output_per_1k - 0.06 / 7.2).abs() < 1e-12);
    }

    #[test]
    fn test_cost_and_rounding() {
        let pricing = ModelPricing::new(0.03, 0.06);
        let cost = pricing.cost(1000, 500);
        assert!((cost - 0.06).abs() < 1e-12);
        assert_eq!(round_cost(0.123456), 0.1235);
        assert_eq!(pricing_for(&LLMProvider::Ollama, "llama3").cost(10_000, 10_000), 0.0);
    }
}
