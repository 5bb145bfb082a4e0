//! Provider调用错误

use thiserror::Error;

/// 单个Provider的失败记录
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: Box<ProviderError>,
}

/// Provider调用错误，区分可重试（瞬时）与不可重试（永久）两类
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 限流、网络抖动、服务端5xx等瞬时错误
    #[error("provider `{provider}` 暂时不可用: {message}")]
    Transient { provider: String, message: String },

    /// 单次调用超时
    #[error("provider `{provider}` 调用超时（{seconds}秒）")]
    Timeout { provider: String, seconds: u64 },

    /// 鉴权失败、请求格式错误等永久错误
    #[error("provider `{provider}` 调用失败: {message}")]
    Permanent { provider: String, message: String },

    #[error("provider `{0}` 未注册")]
    NotRegistered(String),

    /// 所有候选Provider均失败，携带每一次失败的原因
    #[error("所有provider均调用失败: {}", summarize_failures(.0))]
    AllFailed(Vec<ProviderFailure>),
}

const PERMANENT_MARKERS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid_api_key",
    "authentication",
    "400 bad request",
    "bad request",
    "invalid_request",
    "malformed",
    "404",
    "model not found",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate_limit",
    "too many requests",
    "timeout",
    "timed out",
    "500",
    "502",
    "503",
    "504",
    "overloaded",
    "connection",
    "temporarily",
];

impl ProviderError {
    /// 根据底层错误信息对失败进行分类
    ///
    /// 无法识别的错误按瞬时错误处理，由有上限的重试兜底。
    pub fn classify(provider: &str, message: &str) -> Self {
        let lowered = message.to_lowercase();
        let provider = provider.to_string();
        let message = message.to_string();

        if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m))
            && !PERMANENT_MARKERS.iter().any(|m| lowered.contains(m))
        {
            return ProviderError::Transient { provider, message };
        }
        if PERMANENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return ProviderError::Permanent { provider, message };
        }
        ProviderError::Transient { provider, message }
    }

    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient { .. } | ProviderError::Timeout { .. }
        )
    }

    /// 出错的provider名称（聚合错误没有单一来源）
    pub fn provider(&self) -> Option<&str> {
        match self {
            ProviderError::Transient { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Permanent { provider, .. } => Some(provider),
            ProviderError::NotRegistered(name) => Some(name),
            ProviderError::AllFailed(_) => None,
        }
    }

    /// 聚合错误中的全部失败记录
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            ProviderError::AllFailed(failures) => failures,
            _ => &[],
        }
    }
}

fn summarize_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "没有可用的候选provider".to_string();
    }
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.provider, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
