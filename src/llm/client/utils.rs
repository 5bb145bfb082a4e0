use crate::{llm::client::types::TokenUsage, utils::token_estimator::TokenEstimator};

use std::sync::LazyLock;

static TOKEN_ESTIMATOR: LazyLock<TokenEstimator> = LazyLock::new(TokenEstimator::new);

/// 按字符密度估算文本的token数
pub fn estimate_tokens(text: &str) -> usize {
    TOKEN_ESTIMATOR.estimate_tokens(text).estimated_tokens
}

/// 估算token使用情况（基于文本长度）
pub fn estimate_token_usage(input_text: &str, output_text: &str) -> TokenUsage {
    TokenUsage::new(estimate_tokens(input_text), estimate_tokens(output_text))
}
