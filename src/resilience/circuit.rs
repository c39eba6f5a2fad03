//! Keyed circuit breaker.
//!
//! One state machine per service name, created lazily on first call and kept
//! for the process lifetime. State is shared by all concurrent callers and
//! guarded by a mutex, so failure counts are never lost. The machine has
//! three explicit states:
//!
//! Closed → Open after `failure_threshold` consecutive failures;
//! Open → HalfOpen once the cooldown elapses, admitting exactly one probe;
//! HalfOpen → Closed on probe success, HalfOpen → Open on probe failure.
//! An admitted probe whose future is dropped frees its slot once another
//! cooldown elapses, so cancellation cannot wedge the circuit.
//!
//! Only errors whose [`ErrorKind::trips_breaker`](crate::ErrorKind) holds
//! count as failures; configuration and lookup errors pass through without
//! touching the state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStateKind {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct ServiceCircuit {
    state: CircuitStateKind,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// When the single half-open probe was admitted. Cleared when the probe
    /// reports back; a probe older than the cooldown is treated as abandoned
    /// (its future was dropped) and the slot is reclaimed.
    probe_started: Option<Instant>,
}

impl ServiceCircuit {
    fn new() -> Self {
        Self {
            state: CircuitStateKind::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_started: None,
        }
    }
}

/// Observability view of one service's circuit.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub state: CircuitStateKind,
    pub consecutive_failures: u32,
    /// Remaining cooldown in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

enum Admission {
    /// Run the call; `probe` marks the single half-open attempt.
    Admitted { probe: bool },
    Rejected { retry_after: Duration },
}

pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    services: Mutex<HashMap<String, ServiceCircuit>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Run `call` under the circuit for `service`; while open, fail fast
    /// with [`Error::CircuitOpen`].
    pub async fn execute<T, F, Fut>(&self, service: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.admit(service) {
            Admission::Admitted { probe } => self.run(service, probe, call).await,
            Admission::Rejected { retry_after } => Err(Error::CircuitOpen {
                service: service.to_string(),
                retry_after,
            }),
        }
    }

    /// Like [`execute`](Self::execute), but while the circuit is open the
    /// `fallback` is invoked instead of failing fast.
    pub async fn execute_with_fallback<T, F, Fut, FB, FutB>(
        &self,
        service: &str,
        call: F,
        fallback: FB,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> FutB,
        FutB: Future<Output = Result<T>>,
    {
        match self.admit(service) {
            Admission::Admitted { probe } => self.run(service, probe, call).await,
            Admission::Rejected { retry_after } => {
                info!(service, retry_after_s = retry_after.as_secs(), "circuit open, serving fallback");
                fallback().await
            }
        }
    }

    async fn run<T, F, Fut>(&self, service: &str, probe: bool, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match call().await {
            Ok(value) => {
                self.on_success(service, probe);
                Ok(value)
            }
            Err(err) => {
                // Deterministic errors (bad config, disabled capability) are
                // returned unchanged and never counted.
                if err.kind().trips_breaker() {
                    self.on_failure(service, probe);
                }
                Err(err)
            }
        }
    }

    fn admit(&self, service: &str) -> Admission {
        let mut services = self.services.lock().unwrap_or_else(|p| p.into_inner());
        let circuit = services
            .entry(service.to_string())
            .or_insert_with(ServiceCircuit::new);
        let now = Instant::now();
        match circuit.state {
            CircuitStateKind::Closed => Admission::Admitted { probe: false },
            CircuitStateKind::Open => {
                let deadline = circuit
                    .opened_at
                    .map(|t| t + self.cfg.cooldown)
                    .unwrap_or(now);
                if now >= deadline {
                    circuit.state = CircuitStateKind::HalfOpen;
                    circuit.probe_started = Some(now);
                    info!(service, "circuit half-open, admitting probe");
                    Admission::Admitted { probe: true }
                } else {
                    Admission::Rejected {
                        retry_after: deadline - now,
                    }
                }
            }
            CircuitStateKind::HalfOpen => {
                // Exactly one probe at a time, but the slot must not be held
                // forever: a caller may drop the probe future without either
                // completion handler running.
                match circuit.probe_started.map(|t| t + self.cfg.cooldown) {
                    Some(slot_expiry) if now < slot_expiry => Admission::Rejected {
                        retry_after: slot_expiry - now,
                    },
                    _ => {
                        circuit.probe_started = Some(now);
                        Admission::Admitted { probe: true }
                    }
                }
            }
        }
    }

    fn on_success(&self, service: &str, probe: bool) {
        let mut services = self.services.lock().unwrap_or_else(|p| p.into_inner());
        let Some(circuit) = services.get_mut(service) else {
            return;
        };
        if probe {
            circuit.state = CircuitStateKind::Closed;
            circuit.probe_started = None;
            circuit.opened_at = None;
            circuit.consecutive_failures = 0;
            info!(service, "probe succeeded, circuit closed");
        } else if circuit.state == CircuitStateKind::Closed {
            circuit.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, service: &str, probe: bool) {
        let mut services = self.services.lock().unwrap_or_else(|p| p.into_inner());
        let Some(circuit) = services.get_mut(service) else {
            return;
        };
        if probe {
            circuit.state = CircuitStateKind::Open;
            circuit.probe_started = None;
            circuit.opened_at = Some(Instant::now());
            warn!(service, "probe failed, circuit re-opened");
            return;
        }
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        if circuit.state == CircuitStateKind::Closed
            && circuit.consecutive_failures >= self.cfg.failure_threshold
        {
            circuit.state = CircuitStateKind::Open;
            circuit.opened_at = Some(Instant::now());
            warn!(
                service,
                failures = circuit.consecutive_failures,
                cooldown_s = self.cfg.cooldown.as_secs(),
                "failure threshold reached, circuit opened"
            );
        }
    }

    /// Snapshot of one service's circuit, if it has been exercised.
    pub fn snapshot(&self, service: &str) -> Option<CircuitSnapshot> {
        let services = self.services.lock().unwrap_or_else(|p| p.into_inner());
        let circuit = services.get(service)?;
        let now = Instant::now();
        let open_remaining_ms = match circuit.state {
            CircuitStateKind::Open => circuit.opened_at.map(|t| {
                let deadline = t + self.cfg.cooldown;
                deadline.saturating_duration_since(now).as_millis() as u64
            }),
            _ => None,
        };
        Some(CircuitSnapshot {
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
            open_remaining_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_cooldown(Duration::from_millis(cooldown_ms)),
        )
    }

    async fn fail(b: &CircuitBreaker, service: &str) {
        let _ = b
            .execute::<(), _, _>(service, || async {
                Err(Error::provider_failure("x", "chat", anyhow::anyhow!("down")))
            })
            .await;
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_short_circuits() {
        let b = breaker(3, 10_000);
        for _ in 0..3 {
            fail(&b, "svc").await;
        }
        assert_eq!(b.snapshot("svc").unwrap().state, CircuitStateKind::Open);

        // Callback must not run while open.
        let ran = AtomicU32::new(0);
        let err = b
            .execute::<(), _, _>("svc", || async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CircuitOpen { .. }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_below_threshold_stays_closed() {
        let b = breaker(3, 10_000);
        fail(&b, "svc").await;
        fail(&b, "svc").await;
        let snap = b.snapshot("svc").unwrap();
        assert_eq!(snap.state, CircuitStateKind::Closed);
        assert_eq!(snap.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let b = breaker(3, 10_000);
        fail(&b, "svc").await;
        fail(&b, "svc").await;
        b.execute("svc", || async { Ok(()) }).await.unwrap();
        assert_eq!(b.snapshot("svc").unwrap().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_probe_success_closes_circuit() {
        let b = breaker(1, 20);
        fail(&b, "svc").await;
        assert_eq!(b.snapshot("svc").unwrap().state, CircuitStateKind::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        b.execute("svc", || async { Ok(()) }).await.unwrap();
        let snap = b.snapshot("svc").unwrap();
        assert_eq!(snap.state, CircuitStateKind::Closed);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens_with_fresh_cooldown() {
        let b = breaker(1, 20);
        fail(&b, "svc").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        fail(&b, "svc").await; // the probe
        let snap = b.snapshot("svc").unwrap();
        assert_eq!(snap.state, CircuitStateKind::Open);
        assert!(snap.open_remaining_ms.unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn test_exactly_one_probe_admitted() {
        let b = breaker(1, 20);
        fail(&b, "svc").await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        // First admission transitions to half-open and takes the probe slot;
        // while the probe is parked, a second call must be rejected.
        match b.admit("svc") {
            Admission::Admitted { probe } => assert!(probe),
            Admission::Rejected { .. } => panic!("probe should be admitted"),
        }
        match b.admit("svc") {
            Admission::Rejected { retry_after } => assert!(retry_after > Duration::ZERO),
            Admission::Admitted { .. } => panic!("second probe should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_probe_does_not_wedge_circuit() {
        let b = breaker(1, 20);
        fail(&b, "svc").await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Cancel the probe mid-flight; its future is dropped before either
        // completion handler runs.
        let probe = b.execute::<(), _, _>("svc", || async {
            std::future::pending::<Result<()>>().await
        });
        assert!(tokio::time::timeout(Duration::from_millis(10), probe)
            .await
            .is_err());
        assert_eq!(b.snapshot("svc").unwrap().state, CircuitStateKind::HalfOpen);

        // Once the abandoned slot expires, a fresh probe is admitted and can
        // close the circuit.
        tokio::time::sleep(Duration::from_millis(40)).await;
        b.execute("svc", || async { Ok(()) }).await.unwrap();
        assert_eq!(b.snapshot("svc").unwrap().state, CircuitStateKind::Closed);
    }

    #[tokio::test]
    async fn test_fallback_served_while_open() {
        let b = breaker(1, 10_000);
        fail(&b, "svc").await;
        let out = b
            .execute_with_fallback(
                "svc",
                || async { Ok("primary") },
                || async { Ok("fallback") },
            )
            .await
            .unwrap();
        assert_eq!(out, "fallback");
    }

    #[tokio::test]
    async fn test_config_errors_do_not_count() {
        let b = breaker(1, 10_000);
        let _ = b
            .execute::<(), _, _>("svc", || async {
                Err(Error::configuration("missing model"))
            })
            .await;
        assert_eq!(b.snapshot("svc").unwrap().state, CircuitStateKind::Closed);
        assert_eq!(b.snapshot("svc").unwrap().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_circuits_are_independent_per_service() {
        let b = breaker(1, 10_000);
        fail(&b, "a").await;
        assert_eq!(b.snapshot("a").unwrap().state, CircuitStateKind::Open);
        b.execute("b", || async { Ok(()) }).await.unwrap();
        assert_eq!(b.snapshot("b").unwrap().state, CircuitStateKind::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        let b = Arc::new(breaker(100, 10_000));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let b = b.clone();
            handles.push(tokio::spawn(async move {
                fail(&b, "svc").await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(b.snapshot("svc").unwrap().consecutive_failures, 2);
    }
}
