use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::llm::client::types::TokenUsage;

/// 缓存性能监控器
#[derive(Clone, Default)]
pub struct CachePerformanceMonitor {
    metrics: Arc<CacheMetrics>,
}

/// 缓存指标
#[derive(Default)]
struct CacheMetrics {
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_writes: AtomicUsize,
    cache_errors: AtomicUsize,
    /// 节省的费用，单位为百万分之一美元
    total_cost_saved_micros: AtomicU64,
    total_input_tokens_saved: AtomicUsize,
    total_output_tokens_saved: AtomicUsize,
    category_metrics: RwLock<HashMap<String, CategoryMetrics>>,
}

#[derive(Default)]
struct CategoryMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// 缓存性能报告
#[derive(Debug, Serialize, Deserialize)]
pub struct CachePerformanceReport {
    pub hit_rate: f64,
    pub total_operations: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_writes: usize,
    pub cache_errors: usize,
    /// 节省的费用（美元）
    pub cost_saved: f64,
    pub input_tokens_saved: usize,
    pub output_tokens_saved: usize,
    pub category_stats: HashMap<String, CategoryPerformanceStats>,
}

/// 分类性能统计
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPerformanceStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CachePerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录缓存命中
    pub fn record_cache_hit(&self, category: &str, token_usage: TokenUsage, cost_saved: f64) {
        self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .total_input_tokens_saved
            .fetch_add(token_usage.input_tokens, Ordering::Relaxed);
        self.metrics
            .total_output_tokens_saved
            .fetch_add(token_usage.output_tokens, Ordering::Relaxed);
        self.metrics.total_cost_saved_micros.fetch_add(
            (cost_saved.max(0.0) * 1_000_000.0).round() as u64,
            Ordering::Relaxed,
        );

        if let Ok(mut category_map) = self.metrics.category_metrics.write() {
            let category_metrics = category_map.entry(category.to_string()).or_default();
            category_metrics.hits.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            target: "cache",
            %category,
            input_tokens = token_usage.input_tokens,
            output_tokens = token_usage.output_tokens,
            cost_saved,
            "💰 缓存命中"
        );
    }

    /// 记录缓存未命中
    pub fn record_cache_miss(&self, category: &str) {
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut category_map) = self.metrics.category_metrics.write() {
            let category_metrics = category_map.entry(category.to_string()).or_default();
            category_metrics.misses.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(target: "cache", %category, "⌛ 缓存未命中");
    }

    /// 记录缓存写入
    pub fn record_cache_write(&self, category: &str) {
        self.metrics.cache_writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "cache", %category, "💾 结果已缓存");
    }

    /// 记录缓存错误
    pub fn record_cache_error(&self, category: &str, error: &str) {
        self.metrics.cache_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(target: "cache", %category, %error, "❌ 缓存错误");
    }

    /// 生成性能报告
    pub fn generate_report(&self) -> CachePerformanceReport {
        let hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let total_operations = hits + misses;

        let hit_rate = if total_operations > 0 {
            hits as f64 / total_operations as f64
        } else {
            0.0
        };

        let category_stats = match self.metrics.category_metrics.read() {
            Ok(category_map) => category_map
                .iter()
                .map(|(category, metrics)| {
                    let cat_hits = metrics.hits.load(Ordering::Relaxed);
                    let cat_misses = metrics.misses.load(Ordering::Relaxed);
                    let cat_hit_rate = if cat_hits + cat_misses > 0 {
                        cat_hits as f64 / (cat_hits + cat_misses) as f64
                    } else {
                        0.0
                    };
                    (
                        category.clone(),
                        CategoryPerformanceStats {
                            hits: cat_hits,
                            misses: cat_misses,
                            hit_rate: cat_hit_rate,
                        },
                    )
                })
                .collect(),
            Err(_) => HashMap::new(),
        };

        CachePerformanceReport {
            hit_rate,
            total_operations,
            cache_hits: hits,
            cache_misses: misses,
            cache_writes: self.metrics.cache_writes.load(Ordering::Relaxed),
            cache_errors: self.metrics.cache_errors.load(Ordering::Relaxed),
            cost_saved: self.metrics.total_cost_saved_micros.load(Ordering::Relaxed) as f64
                / 1_000_000.0,
            input_tokens_saved: self
                .metrics
                .total_input_tokens_saved
                .load(Ordering::Relaxed),
            output_tokens_saved: self
                .metrics
                .total_output_tokens_saved
                .load(Ordering::Relaxed),
            category_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_groups_by_role_scope() {
        let monitor = CachePerformanceMonitor::new();
        monitor.record_cache_hit("writer", TokenUsage::new(1200, 800), 0.0125);
        monitor.record_cache_miss("writer");
        monitor.record_cache_miss("reviewer");
        monitor.record_cache_write("reviewer");

        let report = monitor.generate_report();
        assert_eq!(report.total_operations, 3);
        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.cache_writes, 1);
        assert_eq!(report.input_tokens_saved, 1200);
        assert_eq!(report.output_tokens_saved, 800);
        assert!((report.cost_saved - 0.0125).abs() < 1e-9);

        let writer = &report.category_stats["writer"];
        assert_eq!((writer.hits, writer.misses), (1, 1));
        assert_eq!(writer.hit_rate, 0.5);
        assert_eq!(report.category_stats["reviewer"].hit_rate, 0.0);
    }

    #[test]
    fn test_empty_report() {
        let report = CachePerformanceMonitor::new().generate_report();
        assert_eq!(report.hit_rate, 0.0);
        assert!(report.category_stats.is_empty());
    }
}
