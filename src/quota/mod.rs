//! 用户配额：按窗口计数的任务限流与每日token用量

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::QuotaConfig;
use crate::error::GenerationError;

const DAY_SECONDS: i64 = 86_400;
const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CounterKind {
    Tasks,
    Tokens,
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start: i64,
    value: u64,
}

/// 内存中的配额台账
#[derive(Debug)]
pub struct UsageLedger {
    config: QuotaConfig,
    counters: Mutex<HashMap<(String, CounterKind), WindowCounter>>,
}

impl UsageLedger {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// 不做任何限制的台账
    pub fn unlimited() -> Self {
        Self::new(QuotaConfig {
            enabled: false,
            ..QuotaConfig::default()
        })
    }

    /// 登记一次任务提交，超出窗口上限时返回RateLimited
    pub fn check_rate_limit(&self, user_id: Option<&str>) -> Result<u64, GenerationError> {
        self.check_rate_limit_at(user_id, Utc::now())
    }

    pub fn check_rate_limit_at(
        &self,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u64, GenerationError> {
        if !self.config.enabled {
            return Ok(0);
        }
        let window = self.config.window_seconds.max(1) as i64;
        let count = self.increment(user_id, CounterKind::Tasks, 1, window, now);
        if count > self.config.max_tasks_per_window {
            return Err(GenerationError::RateLimited(format!(
                "用户 {} 在{}秒内提交了{}个任务，上限为{}",
                user_id.unwrap_or(ANONYMOUS_USER),
                window,
                count,
                self.config.max_tasks_per_window
            )));
        }
        Ok(count)
    }

    /// 记录token用量，返回当日累计值
    pub fn record_tokens(&self, user_id: Option<&str>, tokens: u64) -> u64 {
        self.record_tokens_at(user_id, tokens, Utc::now())
    }

    pub fn record_tokens_at(&self, user_id: Option<&str>, tokens: u64, now: DateTime<Utc>) -> u64 {
        self.increment(user_id, CounterKind::Tokens, tokens, DAY_SECONDS, now)
    }

    /// 当日累计token用量
    pub fn token_usage(&self, user_id: Option<&str>) -> u64 {
        self.token_usage_at(user_id, Utc::now())
    }

    pub fn token_usage_at(&self, user_id: Option<&str>, now: DateTime<Utc>) -> u64 {
        let key = (user_id.unwrap_or(ANONYMOUS_USER).to_string(), CounterKind::Tokens);
        let window_start = window_start(now, DAY_SECONDS);
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters
            .get(&key)
            .filter(|c| c.window_start == window_start)
            .map(|c| c.value)
            .unwrap_or(0)
    }

    /// 当日token是否已超过上限
    pub fn check_token_budget(&self, user_id: Option<&str>) -> Result<(), GenerationError> {
        if !self.config.enabled {
            return Ok(());
        }
        if let Some(limit) = self.config.daily_token_limit {
            let used = self.token_usage(user_id);
            if used >= limit {
                return Err(GenerationError::RateLimited(format!(
                    "用户 {} 今日已使用{}个token，上限为{}",
                    user_id.unwrap_or(ANONYMOUS_USER),
                    used,
                    limit
                )));
            }
        }
        Ok(())
    }

    fn increment(
        &self,
        user_id: Option<&str>,
        kind: CounterKind,
        amount: u64,
        window_seconds: i64,
        now: DateTime<Utc>,
    ) -> u64 {
        let key = (user_id.unwrap_or(ANONYMOUS_USER).to_string(), kind);
        let start = window_start(now, window_seconds);
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(key).or_insert(WindowCounter {
            window_start: start,
            value: 0,
        });
        // 窗口过期后重新计数
        if counter.window_start != start {
            counter.window_start = start;
            counter.value = 0;
        }
        counter.value = counter.value.saturating_add(amount);
        counter.value
    }
}

fn window_start(now: DateTime<Utc>, window_seconds: i64) -> i64 {
    let ts = now.timestamp();
    ts - ts.rem_euclid(window_seconds)
}
