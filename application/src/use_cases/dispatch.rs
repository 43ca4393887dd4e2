//! Dispatcher
//!
//! Fans one stage's calls out to the resolved adapters concurrently and
//! collects exactly one [`ProviderResult`] per model. The batch never fails
//! as a whole: every failure mode (open circuit, exhausted retries, worker
//! panic, deadline) is folded into that model's result.

use crate::cache::{CacheKey, ResponseCache};
use crate::circuit::CircuitBreakers;
use crate::config::DispatchConfig;
use crate::ports::progress::ProgressNotifier;
use crate::ports::provider_adapter::AdapterError;
use crate::ports::resolver::ProviderResolver;
use crate::retry::RetryPolicy;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, warn};
use ultra_domain::{
    CachePolicy, GenerationParams, ModelId, ProviderErrorKind, ProviderResult, ResultOrigin, Stage,
};

/// How long past the deadline the collector waits for workers to report their own timeout
const DEADLINE_GRACE: Duration = Duration::from_millis(50);

const DEADLINE_MESSAGE: &str = "request deadline elapsed before the call completed";

/// Parameters shared by every call of one dispatch
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub stage: Stage,
    pub params: GenerationParams,
    /// Overall request deadline; calls still running at this instant are aborted
    pub deadline: Instant,
    pub cache_policy: CachePolicy,
}

impl DispatchPlan {
    pub fn new(stage: Stage, deadline: Instant) -> Self {
        Self {
            stage,
            params: GenerationParams::default(),
            deadline,
            cache_policy: CachePolicy::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }
}

/// One result per dispatched model, in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    results: Vec<ProviderResult>,
}

impl DispatchOutcome {
    pub fn get(&self, model: &ModelId) -> Option<&ProviderResult> {
        self.results.iter().find(|r| &r.model_id == model)
    }

    pub fn results(&self) -> &[ProviderResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ProviderResult> {
        self.results
    }

    pub fn successes(&self) -> impl Iterator<Item = &ProviderResult> {
        self.results.iter().filter(|r| r.is_ok())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Concurrent fan-out with cache, circuit breaking and retry
///
/// Cheap to clone; all shared state lives behind `Arc`s so a clone can be
/// moved into each spawned call.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn ProviderResolver>,
    cache: Option<Arc<ResponseCache>>,
    breakers: Arc<CircuitBreakers>,
    retry: RetryPolicy,
    call_timeout: Duration,
    limits: Arc<HashMap<String, Arc<Semaphore>>>,
}

impl Dispatcher {
    /// Create a dispatcher without a cache and with default circuit breakers
    pub fn new(resolver: Arc<dyn ProviderResolver>, config: &DispatchConfig) -> Self {
        let limits = config
            .provider_limits
            .iter()
            .filter(|(_, limit)| **limit > 0)
            .map(|(provider, limit)| (provider.clone(), Arc::new(Semaphore::new(*limit))))
            .collect();

        Self {
            resolver,
            cache: None,
            breakers: Arc::new(CircuitBreakers::default()),
            retry: config.retry,
            call_timeout: config.call_timeout,
            limits: Arc::new(limits),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakers>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakers> {
        &self.breakers
    }

    pub fn resolver(&self) -> &Arc<dyn ProviderResolver> {
        &self.resolver
    }

    /// Send the same prompt to every model
    pub async fn dispatch(
        &self,
        models: &[ModelId],
        prompt: &str,
        plan: &DispatchPlan,
        progress: &dyn ProgressNotifier,
    ) -> DispatchOutcome {
        let calls = models
            .iter()
            .map(|m| (m.clone(), prompt.to_string()))
            .collect();
        self.dispatch_prompts(calls, plan, progress).await
    }

    /// Send each model its own prompt
    ///
    /// Returns once every call has settled or the plan's deadline elapses,
    /// whichever comes first. Calls outstanding at the deadline are aborted
    /// and reported as `Timeout`.
    pub async fn dispatch_prompts(
        &self,
        calls: Vec<(ModelId, String)>,
        plan: &DispatchPlan,
        progress: &dyn ProgressNotifier,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let stage = plan.stage;
        let params = Arc::new(plan.params.clone());

        let mut order: Vec<ModelId> = Vec::with_capacity(calls.len());
        let mut join_set = JoinSet::new();

        for (model, prompt) in calls {
            if order.contains(&model) {
                continue;
            }
            order.push(model.clone());

            let this = self.clone();
            let params = Arc::clone(&params);
            let policy = plan.cache_policy;
            let deadline = plan.deadline;
            join_set.spawn(async move {
                let call = this.call_model(model.clone(), prompt, stage, &params, policy, deadline);
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(model = %model, stage = stage.as_str(), "Dispatch worker panicked");
                        ProviderResult::error(
                            model,
                            stage,
                            ProviderErrorKind::ProviderUnavailable,
                            "worker task panicked",
                            started.elapsed(),
                        )
                    }
                }
            });
        }

        debug!(stage = stage.as_str(), calls = order.len(), "Dispatching");

        let mut settled: HashMap<ModelId, ProviderResult> = HashMap::new();
        loop {
            match timeout_at(plan.deadline + DEADLINE_GRACE, join_set.join_next()).await {
                Ok(Some(Ok(result))) => {
                    progress.on_task_complete(stage, &result);
                    settled.insert(result.model_id.clone(), result);
                }
                Ok(Some(Err(join_error))) => {
                    warn!(stage = stage.as_str(), error = %join_error, "Dispatch task join error");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        stage = stage.as_str(),
                        outstanding = join_set.len(),
                        "Request deadline elapsed, aborting outstanding calls"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        let results = order
            .into_iter()
            .map(|model| {
                settled.remove(&model).unwrap_or_else(|| {
                    let result = ProviderResult::error(
                        model,
                        stage,
                        ProviderErrorKind::Timeout,
                        DEADLINE_MESSAGE,
                        started.elapsed(),
                    );
                    progress.on_task_complete(stage, &result);
                    result
                })
            })
            .collect();

        DispatchOutcome { results }
    }

    async fn call_model(
        &self,
        model: ModelId,
        prompt: String,
        stage: Stage,
        params: &GenerationParams,
        policy: CachePolicy,
        deadline: Instant,
    ) -> ProviderResult {
        let key = CacheKey::new(&model, &prompt, params);
        if policy.reads()
            && let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&key)
        {
            debug!(model = %model, stage = stage.as_str(), "Cache hit");
            return hit.served_from_cache(stage);
        }

        let binding = match self.resolver.resolve(&model) {
            Ok(binding) => binding,
            Err(e) => {
                return ProviderResult::error(
                    model,
                    stage,
                    ProviderErrorKind::ProviderUnavailable,
                    e.to_string(),
                    Duration::ZERO,
                );
            }
        };

        let Some(permit) = self.breakers.try_acquire(&model) else {
            debug!(model = %model, stage = stage.as_str(), "Circuit open, call short-circuited");
            return ProviderResult::short_circuit(model, stage);
        };

        let started = Instant::now();
        let adapter = binding.adapter.as_ref();
        let prompt_ref = prompt.as_str();
        let call_timeout = self.call_timeout;
        let retry = self.retry;
        let limit = self.limits.get(&binding.provider).cloned();
        let work = async move {
            // Waiting for a slot counts against the deadline
            let _slot = match limit {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(slot) => Some(slot),
                    Err(_) => {
                        let closed = AdapterError::ProviderUnavailable(
                            "concurrency limiter closed".to_string(),
                        );
                        return (Err(closed), 0);
                    }
                },
                None => None,
            };
            retry
                .run(|| async move {
                    match timeout(call_timeout, adapter.generate(prompt_ref, params)).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::Timeout(format!(
                            "no response within {}ms",
                            call_timeout.as_millis()
                        ))),
                    }
                })
                .await
        };

        // A call cut off by the deadline is a failure for the breaker too
        let (outcome, attempts) = match timeout_at(deadline, work).await {
            Ok(done) => done,
            Err(_) => (Err(AdapterError::Timeout(DEADLINE_MESSAGE.to_string())), 1),
        };
        let latency = started.elapsed();

        match outcome {
            Ok(generation) => {
                permit.record_success();
                let origin = if binding.mocked {
                    ResultOrigin::Mock
                } else {
                    ResultOrigin::Live
                };
                let result = ProviderResult::ok(model, stage, generation.text, latency)
                    .with_tokens(generation.tokens_used)
                    .with_origin(origin)
                    .with_attempts(attempts);

                debug!(
                    model = %result.model_id,
                    stage = stage.as_str(),
                    latency_ms = result.latency_ms,
                    attempts,
                    mocked = binding.mocked,
                    "Call succeeded"
                );

                if policy.writes()
                    && !binding.mocked
                    && let Some(cache) = &self.cache
                {
                    cache.insert(key, result.clone());
                }
                result
            }
            Err(e) => {
                permit.record_failure();
                warn!(
                    model = %model,
                    stage = stage.as_str(),
                    kind = e.kind().as_str(),
                    attempts,
                    "Call failed: {}",
                    e
                );
                ProviderResult::error(model, stage, e.kind(), e.to_string(), latency)
                    .with_attempts(attempts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::circuit::{CircuitBreakerConfig, CircuitState};
    use crate::ports::progress::NoProgress;
    use crate::ports::provider_adapter::{Generation, ProviderAdapter};
    use crate::ports::resolver::{Binding, ResolveError};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ultra_domain::Capabilities;

    #[derive(Clone, Copy)]
    enum Behavior {
        Answer,
        Fail(ProviderErrorKind),
        Hang,
        Panic,
    }

    struct TestAdapter {
        name: String,
        behavior: Behavior,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl TestAdapter {
        fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
                delay: Duration::from_millis(10),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for TestAdapter {
        async fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<Generation, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.behavior {
                Behavior::Answer => Ok(Generation::new(format!("{} says: {}", self.name, prompt))),
                Behavior::Fail(ProviderErrorKind::Timeout) => {
                    Err(AdapterError::Timeout("slow".into()))
                }
                Behavior::Fail(ProviderErrorKind::RateLimited) => {
                    Err(AdapterError::rate_limited("429", None))
                }
                Behavior::Fail(ProviderErrorKind::Auth) => Err(AdapterError::Auth("denied".into())),
                Behavior::Fail(_) => Err(AdapterError::ProviderUnavailable("down".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Generation::new("too late"))
                }
                Behavior::Panic => panic!("adapter bug"),
            }
        }

        fn describe(&self) -> Capabilities {
            Capabilities::new(8192)
        }
    }

    struct TestResolver {
        bindings: HashMap<ModelId, Binding>,
    }

    impl TestResolver {
        fn new(adapters: &[(&str, Arc<TestAdapter>)]) -> Arc<Self> {
            let bindings = adapters
                .iter()
                .map(|(id, adapter)| {
                    let model = ModelId::new(*id);
                    let binding = Binding::new(
                        Arc::clone(adapter) as Arc<dyn ProviderAdapter>,
                        model.provider_hint(),
                    );
                    (model, binding)
                })
                .collect();
            Arc::new(Self { bindings })
        }
    }

    impl ProviderResolver for TestResolver {
        fn resolve(&self, model: &ModelId) -> Result<Binding, ResolveError> {
            self.bindings
                .get(model)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownModel(model.clone()))
        }

        fn list_available(&self) -> BTreeSet<ModelId> {
            self.bindings.keys().cloned().collect()
        }
    }

    fn config() -> DispatchConfig {
        DispatchConfig::default()
            .with_call_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy::none())
    }

    fn plan(secs: u64) -> DispatchPlan {
        DispatchPlan::new(Stage::Initial, Instant::now() + Duration::from_secs(secs))
    }

    fn ids(names: &[&str]) -> Vec<ModelId> {
        names.iter().map(|n| ModelId::new(*n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_order() {
        let a = TestAdapter::new("a", Behavior::Answer);
        let b = TestAdapter::new("b", Behavior::Fail(ProviderErrorKind::Auth));
        let c = TestAdapter::new("c", Behavior::Answer);
        let resolver = TestResolver::new(&[("p:a", a), ("p:b", b), ("p:c", c)]);
        let dispatcher = Dispatcher::new(resolver, &config());

        let outcome = dispatcher
            .dispatch(&ids(&["p:c", "p:a", "p:b"]), "q", &plan(60), &NoProgress)
            .await;

        let order: Vec<_> = outcome.results().iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(order, vec!["p:c", "p:a", "p:b"]);
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(
            outcome.get(&ModelId::new("p:b")).unwrap().error_kind(),
            Some(ProviderErrorKind::Auth)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_timeout_for_outstanding_calls() {
        let fast = TestAdapter::new("fast", Behavior::Answer);
        let slow = TestAdapter::new("slow", Behavior::Hang);
        let resolver = TestResolver::new(&[("p:fast", fast), ("p:slow", slow)]);
        let dispatcher =
            Dispatcher::new(resolver, &config().with_call_timeout(Duration::from_secs(7200)));

        let outcome = dispatcher
            .dispatch(&ids(&["p:fast", "p:slow"]), "q", &plan(2), &NoProgress)
            .await;

        assert!(outcome.get(&ModelId::new("p:fast")).unwrap().is_ok());
        let slow = outcome.get(&ModelId::new("p:slow")).unwrap();
        assert_eq!(slow.error_kind(), Some(ProviderErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_timeouts_count_toward_circuit() {
        let hanging = TestAdapter::new("hang", Behavior::Hang);
        let resolver = TestResolver::new(&[("p:hang", hanging.clone())]);
        let breakers = Arc::new(CircuitBreakers::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_cool_down(Duration::from_secs(300)),
        ));
        let config = config().with_call_timeout(Duration::from_secs(30));
        let dispatcher = Dispatcher::new(resolver, &config).with_breakers(Arc::clone(&breakers));
        let models = ids(&["p:hang"]);

        let first = dispatcher.dispatch(&models, "q", &plan(2), &NoProgress).await;
        assert_eq!(first.results()[0].error_kind(), Some(ProviderErrorKind::Timeout));
        assert_eq!(first.results()[0].origin, ResultOrigin::Live);

        for _ in 0..4 {
            let outcome = dispatcher.dispatch(&models, "q", &plan(2), &NoProgress).await;
            assert_eq!(outcome.results()[0].origin, ResultOrigin::ShortCircuit);
        }
        assert_eq!(hanging.calls(), 1);
        assert_eq!(breakers.state(&ModelId::new("p:hang")), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout_is_classified() {
        let slow = TestAdapter::new("slow", Behavior::Hang);
        let resolver = TestResolver::new(&[("p:slow", slow)]);
        let dispatcher =
            Dispatcher::new(resolver, &config().with_call_timeout(Duration::from_secs(1)));

        let outcome = dispatcher
            .dispatch(&ids(&["p:slow"]), "q", &plan(60), &NoProgress)
            .await;
        let result = &outcome.results()[0];
        assert_eq!(result.error_kind(), Some(ProviderErrorKind::Timeout));
        assert!(result.error_message().unwrap().contains("1000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_becomes_unavailable() {
        let bad = TestAdapter::new("bad", Behavior::Panic);
        let good = TestAdapter::new("good", Behavior::Answer);
        let resolver = TestResolver::new(&[("p:bad", bad), ("p:good", good)]);
        let dispatcher = Dispatcher::new(resolver, &config());

        let outcome = dispatcher
            .dispatch(&ids(&["p:bad", "p:good"]), "q", &plan(60), &NoProgress)
            .await;
        assert_eq!(
            outcome.get(&ModelId::new("p:bad")).unwrap().error_kind(),
            Some(ProviderErrorKind::ProviderUnavailable)
        );
        assert!(outcome.get(&ModelId::new("p:good")).unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_dispatch_is_served_from_cache() {
        let a = TestAdapter::new("a", Behavior::Answer);
        let b = TestAdapter::new("b", Behavior::Fail(ProviderErrorKind::ProviderUnavailable));
        let resolver = TestResolver::new(&[("p:a", a.clone()), ("p:b", b.clone())]);
        let dispatcher = Dispatcher::new(resolver, &config())
            .with_cache(Arc::new(ResponseCache::new(&CacheConfig::default())));
        let models = ids(&["p:a", "p:b"]);

        dispatcher.dispatch(&models, "q", &plan(60), &NoProgress).await;
        let second = dispatcher.dispatch(&models, "q", &plan(60), &NoProgress).await;

        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 2);
        let hit = second.get(&ModelId::new("p:a")).unwrap();
        assert_eq!(hit.origin, ResultOrigin::Cached);
        assert_eq!(hit.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_policies() {
        let a = TestAdapter::new("a", Behavior::Answer);
        let resolver = TestResolver::new(&[("p:a", a.clone())]);
        let cache = Arc::new(ResponseCache::default());
        let dispatcher = Dispatcher::new(resolver, &config()).with_cache(Arc::clone(&cache));
        let models = ids(&["p:a"]);

        let bypass = plan(60).with_cache_policy(CachePolicy::Bypass);
        dispatcher.dispatch(&models, "q", &bypass, &NoProgress).await;
        assert!(cache.is_empty());

        let refresh = plan(60).with_cache_policy(CachePolicy::Refresh);
        dispatcher.dispatch(&models, "q", &refresh, &NoProgress).await;
        dispatcher.dispatch(&models, "q", &refresh, &NoProgress).await;
        assert_eq!(a.calls(), 3);
        assert_eq!(cache.len(), 1);

        dispatcher.dispatch(&models, "q", &plan(60), &NoProgress).await;
        assert_eq!(a.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits_without_calling_adapter() {
        let flaky = TestAdapter::new(
            "flaky",
            Behavior::Fail(ProviderErrorKind::ProviderUnavailable),
        );
        let resolver = TestResolver::new(&[("p:flaky", flaky.clone())]);
        let breakers = Arc::new(CircuitBreakers::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_cool_down(Duration::from_secs(30)),
        ));
        let dispatcher = Dispatcher::new(resolver, &config()).with_breakers(breakers);
        let models = ids(&["p:flaky"]);

        for _ in 0..2 {
            dispatcher.dispatch(&models, "q", &plan(60), &NoProgress).await;
        }
        assert_eq!(flaky.calls(), 2);

        for _ in 0..3 {
            let outcome = dispatcher.dispatch(&models, "q", &plan(60), &NoProgress).await;
            let result = &outcome.results()[0];
            assert_eq!(result.origin, ResultOrigin::ShortCircuit);
            assert_eq!(result.error_kind(), Some(ProviderErrorKind::ProviderUnavailable));
        }
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_are_retried() {
        let limited = TestAdapter::new("rl", Behavior::Fail(ProviderErrorKind::RateLimited));
        let resolver = TestResolver::new(&[("p:rl", limited.clone())]);
        let dispatcher = Dispatcher::new(
            resolver,
            &config().with_retry(RetryPolicy::default().with_max_retries(2)),
        );

        let outcome = dispatcher
            .dispatch(&ids(&["p:rl"]), "q", &plan(60), &NoProgress)
            .await;
        assert_eq!(outcome.results()[0].attempts, 3);
        assert_eq!(limited.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_model_is_unavailable() {
        let resolver = TestResolver::new(&[]);
        let dispatcher = Dispatcher::new(resolver, &config());
        let outcome = dispatcher
            .dispatch(&ids(&["p:ghost"]), "q", &plan(60), &NoProgress)
            .await;
        assert_eq!(
            outcome.results()[0].error_kind(),
            Some(ProviderErrorKind::ProviderUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_limit_serializes_calls() {
        let a = TestAdapter::new("a", Behavior::Answer);
        let b = TestAdapter::new("b", Behavior::Answer);
        let resolver = TestResolver::new(&[("p:a", a), ("p:b", b)]);
        let dispatcher = Dispatcher::new(resolver, &config().with_provider_limit("p", 1));

        let started = Instant::now();
        let outcome = dispatcher
            .dispatch(&ids(&["p:a", "p:b"]), "q", &plan(60), &NoProgress)
            .await;
        assert_eq!(outcome.success_count(), 2);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
