//! 统一的文本生成能力接口

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::error::ProviderError;
use super::pricing::{ModelPricing, round_cost};
use super::types::GenerationParams;
use super::utils::estimate_tokens;

/// 一个可注册到路由器的文本生成后端
#[async_trait]
pub trait Provider: Send + Sync {
    /// 注册名
    fn name(&self) -> &str;

    /// 实际调用的模型名
    fn model(&self) -> &str;

    /// 是否适合处理超长上下文
    fn supports_long_context(&self) -> bool {
        false
    }

    /// 计费表
    fn pricing(&self) -> ModelPricing;

    /// 单次生成
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String, ProviderError>;

    /// 流式生成，默认退化为一次性返回完整文本的单元素流
    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> Result<BoxStream<'static, Result<String, ProviderError>>, ProviderError> {
        let text = self.generate(prompt, system_prompt, params).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }

    /// 计算token数，没有专用分词器的后端使用字符密度估算
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// 估算费用（美元，保留4位小数）
    fn estimate_cost(&self, text: &str, expected_output_tokens: usize) -> f64 {
        round_cost(
            self.pricing()
                .cost(self.count_tokens(text), expected_output_tokens),
        )
    }
}
