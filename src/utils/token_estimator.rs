use serde::{Deserialize, Serialize};

/// Token估算器，按字符密度估算文本的token数量
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator {
    /// token计算规则
    rules: TokenCalculationRules,
}

/// Token计算规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCalculationRules {
    /// 拉丁字符的平均比例（字符数/token数）
    pub latin_char_per_token: f64,
    /// 密集文字（中日韩）的平均比例
    pub dense_char_per_token: f64,
    /// 基础token开销
    pub base_token_overhead: usize,
}

impl Default for TokenCalculationRules {
    fn default() -> Self {
        Self {
            latin_char_per_token: 4.0,
            dense_char_per_token: 1.5,
            base_token_overhead: 0,
        }
    }
}

/// Token估算结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEstimation {
    pub estimated_tokens: usize,
    pub character_count: usize,
    pub dense_char_count: usize,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: TokenCalculationRules) -> Self {
        Self { rules }
    }

    /// 估算文本的token数量
    pub fn estimate_tokens(&self, text: &str) -> TokenEstimation {
        let character_count = text.chars().count();
        let dense_char_count = text.chars().filter(|c| is_dense_script(*c)).count();
        let latin_char_count = character_count - dense_char_count;

        let dense_tokens = dense_char_count as f64 / self.rules.dense_char_per_token;
        let latin_tokens = latin_char_count as f64 / self.rules.latin_char_per_token;

        TokenEstimation {
            estimated_tokens: (dense_tokens + latin_tokens).floor() as usize
                + self.rules.base_token_overhead,
            character_count,
            dense_char_count,
        }
    }

    /// 估算多个文本片段的总token数量
    pub fn estimate_total_tokens(&self, texts: &[&str]) -> usize {
        texts
            .iter()
            .map(|text| self.estimate_tokens(text).estimated_tokens)
            .sum()
    }
}

/// 是否为中日韩等高密度文字
pub fn is_dense_script(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF |   // CJK统一汉字
        0x3400..=0x4DBF |   // CJK扩展A
        0x20000..=0x2EBEF | // CJK扩展B-F
        0x30000..=0x3134F | // CJK扩展G
        0xF900..=0xFAFF |   // CJK兼容汉字
        0x3040..=0x30FF |   // 平假名、片假名
        0xAC00..=0xD7AF     // 韩文音节
    )
}
