use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::llm::client::pricing::ModelPricing;

/// 可控行为的测试provider
struct StubProvider {
    name: String,
    reply: Result<String, ProviderError>,
    calls: AtomicUsize,
    long_context: bool,
    pricing: ModelPricing,
}

impl StubProvider {
    fn ok(name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            long_context: false,
            pricing: ModelPricing::new(0.0015, 0.002),
        })
    }

    fn failing(name: &str, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Err(error),
            calls: AtomicUsize::new(0),
            long_context: false,
            pricing: ModelPricing::new(0.03, 0.06),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    fn supports_long_context(&self) -> bool {
        self.long_context
    }

    fn pricing(&self) -> ModelPricing {
        self.pricing
    }

    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

fn router() -> ProviderRouter {
    ProviderRouter::new(RetryPolicy::immediate(2), RoutingConfig::default(), 3)
}

fn permanent(name: &str) -> ProviderError {
    ProviderError::Permanent {
        provider: name.to_string(),
        message: "401 unauthorized".to_string(),
    }
}

#[test]
fn test_first_registration_becomes_default() {
    let mut router = router();
    router.register("a", StubProvider::ok("a", "A"), false);
    router.register("b", StubProvider::ok("b", "B"), false);
    assert_eq!(router.default_provider(), Some("a"));

    router.register("c", StubProvider::ok("c", "C"), true);
    assert_eq!(router.default_provider(), Some("c"));
    assert_eq!(router.provider_names(), &["a", "b", "c"]);
}

#[tokio::test]
async fn test_generate_uses_default_provider() {
    let mut router = router();
    let a = StubProvider::ok("a", "from a");
    let b = StubProvider::ok("b", "from b");
    router.register("a", a.clone(), false);
    router.register("b", b.clone(), true);

    let text = router
        .generate("hi", None, &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(text, "from b");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_generate_without_providers_fails() {
    let router = router();
    let err = router
        .generate("hi", None, &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotRegistered(_)));
}

#[tokio::test]
async fn test_fallback_returns_first_success() {
    let mut router = router();
    let broken = StubProvider::failing("broken", permanent("broken"));
    let good = StubProvider::ok("good", "hello");
    let unused = StubProvider::ok("unused", "never");
    router.register("broken", broken.clone(), false);
    router.register("good", good.clone(), false);
    router.register("unused", unused.clone(), false);

    let text = router
        .generate_with_fallback("p", None, &GenerationParams::default(), &[])
        .await
        .unwrap();

    assert_eq!(text, "hello");
    assert_eq!(broken.calls(), 1);
    assert_eq!(good.calls(), 1);
    assert_eq!(unused.calls(), 0);
}

#[tokio::test]
async fn test_fallback_aggregates_every_failure() {
    let mut router = router();
    let transient = StubProvider::failing(
        "flaky",
        ProviderError::Transient {
            provider: "flaky".to_string(),
            message: "503".to_string(),
        },
    );
    router.register("flaky", transient.clone(), false);
    router.register("denied", StubProvider::failing("denied", permanent("denied")), false);

    let err = router
        .generate_with_fallback(
            "p",
            None,
            &GenerationParams::default(),
            &["flaky".to_string(), "denied".to_string(), "ghost".to_string()],
        )
        .await
        .unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 3);
    assert_eq!(failures[0].provider, "flaky");
    assert_eq!(failures[2].provider, "ghost");
    assert!(matches!(*failures[2].error, ProviderError::NotRegistered(_)));
    // 瞬时错误按重试策略重试两次
    assert_eq!(transient.calls(), 2);
}

#[tokio::test]
async fn test_parallel_isolates_failures() {
    let mut router = router();
    router.register("a", StubProvider::ok("a", "A"), false);
    router.register("b", StubProvider::failing("b", permanent("b")), false);
    router.register("c", StubProvider::ok("c", "C"), false);
    router.register("d", StubProvider::ok("d", "D"), false);

    let results = router
        .generate_parallel("p", None, &GenerationParams::default(), &[])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results["a"].as_ref().unwrap(), "A");
    assert!(results["b"].is_err());
    assert_eq!(results["c"].as_ref().unwrap(), "C");
    assert!(!results.contains_key("d"));
}

#[test]
fn test_estimate_cost_is_deterministic() {
    let mut router = router();
    router.register("cheap", StubProvider::ok("cheap", ""), false);
    router.register("pricey", StubProvider::failing("pricey", permanent("pricey")), false);

    // 4000个拉丁字符约1000 tokens
    let text = "a".repeat(4000);
    let first = router.estimate_cost(&text, 1000);
    let second = router.estimate_cost(&text, 1000);

    assert_eq!(first, second);
    assert_eq!(first["cheap"], 0.0035);
    assert_eq!(first["pricey"], 0.09);
}

#[tokio::test]
async fn test_route_follows_task_table() {
    let mut router = router();
    let qwen = StubProvider::ok("qwen", "qwen says");
    let claude = StubProvider::ok("claude", "claude says");
    router.register("qwen", qwen.clone(), true);
    router.register("claude", claude.clone(), false);

    let routed = router
        .route(TaskKind::Outline, "plan", None, &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(routed.provider, "claude");

    let routed = router
        .route(TaskKind::Dialogue, "talk", None, &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(routed.provider, "qwen");
    assert_eq!(routed.text, "qwen says");
}

/// 共享在途计数的慢速provider
struct SlowProvider {
    name: String,
    delay_ms: u64,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "slow-model"
    }

    fn pricing(&self) -> ModelPricing {
        ModelPricing::FREE
    }

    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("{}-done", self.name))
    }
}

#[tokio::test]
async fn test_parallel_stays_within_window() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut router = ProviderRouter::new(RetryPolicy::immediate(1), RoutingConfig::default(), 2);
    let names: Vec<String> = ["p1", "p2", "p3", "p4", "p5"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (i, name) in names.iter().enumerate() {
        // 先提交的更慢，完成顺序与提交顺序相反
        let provider = SlowProvider {
            name: name.clone(),
            delay_ms: (names.len() - i) as u64 * 15,
            in_flight: in_flight.clone(),
            peak: peak.clone(),
        };
        router.register(name, Arc::new(provider), false);
    }

    let results = router
        .generate_parallel("p", None, &GenerationParams::default(), &names)
        .await;

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(results.len(), 5);
    for name in &names {
        assert_eq!(results[name].as_ref().unwrap(), &format!("{}-done", name));
    }
}

#[tokio::test]
async fn test_default_stream_yields_whole_reply() {
    use futures::StreamExt;

    let provider = StubProvider::ok("a", "完整的回复");
    let chunks: Vec<String> = provider
        .generate_stream("p", None, &GenerationParams::default())
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["完整的回复".to_string()]);
    assert_eq!(provider.calls(), 1);

    let failing = StubProvider::failing("b", permanent("b"));
    assert!(
        failing
            .generate_stream("p", None, &GenerationParams::default())
            .await
            .is_err()
    );
}
