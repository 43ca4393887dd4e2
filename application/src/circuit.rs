//! Per-model circuit breakers
//!
//! - Closed: calls pass through, consecutive failures are counted
//! - Open: calls are rejected until the cool-down has elapsed
//! - HalfOpen: exactly one probe call is admitted; its outcome closes or
//!   re-opens the circuit
//!
//! The table is process-wide. Each model's entry has its own lock, so
//! contention on one provider never blocks another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use ultra_domain::ModelId;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breakers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before admitting a probe
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_down: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }
}

#[derive(Debug)]
struct CircuitEntry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
    }
}

type SharedEntry = Arc<Mutex<CircuitEntry>>;

fn lock(entry: &SharedEntry) -> MutexGuard<'_, CircuitEntry> {
    entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Admission ticket for one call
///
/// The holder reports the call's outcome through [`record_success`] or
/// [`record_failure`]. A probe permit dropped without a report (the call
/// was aborted) frees the half-open slot for the next request.
///
/// [`record_success`]: CircuitPermit::record_success
/// [`record_failure`]: CircuitPermit::record_failure
#[derive(Debug)]
pub struct CircuitPermit {
    model: ModelId,
    entry: SharedEntry,
    config: CircuitBreakerConfig,
    probe: bool,
    settled: bool,
}

impl CircuitPermit {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        let mut entry = lock(&self.entry);
        if entry.state != CircuitState::Closed {
            info!(model = %self.model, "Circuit closed after successful probe");
        }
        entry.close();
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        let now = Instant::now();
        let mut entry = lock(&self.entry);
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);

        if self.probe {
            warn!(model = %self.model, "Probe failed, circuit re-opened");
            entry.open(now);
            return;
        }

        debug!(
            model = %self.model,
            failures = entry.consecutive_failures,
            threshold = self.config.failure_threshold,
            "Circuit failure recorded"
        );
        if entry.state == CircuitState::Closed
            && entry.consecutive_failures >= self.config.failure_threshold
        {
            warn!(
                model = %self.model,
                failures = entry.consecutive_failures,
                cool_down_ms = self.config.cool_down.as_millis() as u64,
                "Circuit opened"
            );
            entry.open(now);
        }
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            lock(&self.entry).probe_in_flight = false;
        }
    }
}

/// Process-wide table of circuits keyed by model id
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    entries: RwLock<HashMap<ModelId, SharedEntry>>,
}

impl CircuitBreakers {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn entry(&self, model: &ModelId) -> SharedEntry {
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(entry) = entries.get(model) {
                return Arc::clone(entry);
            }
        }
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            entries
                .entry(model.clone())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitEntry::new()))),
        )
    }

    /// Ask to call `model`; `None` means the circuit rejects the call
    pub fn try_acquire(&self, model: &ModelId) -> Option<CircuitPermit> {
        let shared = self.entry(model);
        let probe = {
            let mut entry = lock(&shared);
            match entry.state {
                CircuitState::Closed => false,
                CircuitState::Open => {
                    let cooled = entry
                        .opened_at
                        .is_none_or(|at| at.elapsed() >= self.config.cool_down);
                    if !cooled {
                        return None;
                    }
                    info!(model = %model, "Circuit half-open, admitting probe");
                    entry.state = CircuitState::HalfOpen;
                    entry.probe_in_flight = true;
                    true
                }
                CircuitState::HalfOpen => {
                    if entry.probe_in_flight {
                        return None;
                    }
                    entry.probe_in_flight = true;
                    true
                }
            }
        };

        Some(CircuitPermit {
            model: model.clone(),
            entry: shared,
            config: self.config,
            probe,
            settled: false,
        })
    }

    pub fn state(&self, model: &ModelId) -> CircuitState {
        lock(&self.entry(model)).state
    }

    pub fn failure_count(&self, model: &ModelId) -> u32 {
        lock(&self.entry(model)).consecutive_failures
    }

    /// Force a circuit back to closed
    pub fn reset(&self, model: &ModelId) {
        lock(&self.entry(model)).close();
    }
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
