//! 有上限的指数退避重试

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use super::error::ProviderError;

/// 重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次调用）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间（毫秒）
    pub min_backoff_ms: u64,
    /// 单次等待的上限（毫秒）
    pub max_backoff_ms: u64,
    /// 抖动比例，0.25表示在基准延迟上下浮动25%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff_ms: 4_000,
            max_backoff_ms: 10_000,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// 不等待的策略，测试中使用
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: 0.0,
        }
    }

    /// 第`attempt`次失败后的基准延迟（未加抖动）
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.min_backoff_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(raw.min(self.max_backoff_ms))
    }

    /// 加入抖动后的延迟，结果不超过`max_backoff_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        if base <= 0.0 || self.jitter <= 0.0 {
            return Duration::from_millis(base as u64);
        }
        let spread = base * self.jitter.clamp(0.0, 1.0);
        let offset = rand::rng().random_range(-spread..=spread);
        let jittered = (base + offset).clamp(0.0, self.max_backoff_ms as f64);
        Duration::from_millis(jittered as u64)
    }

    /// 执行异步操作，瞬时错误按策略重试，永久错误立即返回
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => {
                    tracing::warn!(target: "retry", %label, error = %err, "永久错误，不再重试");
                    return Err(err);
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            target: "retry",
                            %label,
                            attempts = attempt,
                            error = %err,
                            "重试次数已用尽"
                        );
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    eprintln!(
                        "❌ 调用模型服务出错，重试中 (第 {} / {}次尝试): {}",
                        attempt, max_attempts, err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_base_delay_grows_and_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(4_000));
        assert_eq!(policy.base_delay(2), Duration::from_millis(8_000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(10_000));
        assert_eq!(policy.base_delay(30), Duration::from_millis(10_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(1).as_millis() as u64;
            assert!((3_000..=5_000).contains(&delay), "delay {}", delay);
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);

        let result = policy
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::Transient {
                            provider: "p".to_string(),
                            message: "503".to_string(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::immediate(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("auth", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Permanent {
                        provider: "p".to_string(),
                        message: "401".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Timeout {
                        provider: "p".to_string(),
                        seconds: 1,
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
