//! 生成流程的错误类型

use thiserror::Error;

use crate::llm::client::error::ProviderError;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// 请求参数不合法
    #[error("请求参数不合法: {0}")]
    Validation(String),

    /// 重试耗尽后仍然失败的瞬时错误
    #[error("模型服务暂时不可用: {0}")]
    ProviderTransient(ProviderError),

    /// 鉴权、请求格式等不可恢复的错误
    #[error("模型服务调用失败: {0}")]
    ProviderPermanent(ProviderError),

    /// 模型返回内容无法解析
    #[error("大纲格式错误: {0}")]
    Parse(String),

    /// 大纲缺少必要字段
    #[error("大纲缺少必要字段: {0}")]
    OutlineValidation(String),

    /// 流程中其他不可恢复的错误
    #[error("生成流程中断: {0}")]
    PipelineFatal(String),

    /// 用户配额不足
    #[error("超出使用配额: {0}")]
    RateLimited(String),
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        let transient = match &err {
            ProviderError::AllFailed(failures) => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_transient())
            }
            other => other.is_transient(),
        };
        if transient {
            GenerationError::ProviderTransient(err)
        } else {
            GenerationError::ProviderPermanent(err)
        }
    }
}
