//! The Agent Message Bus: registration, priority-queued delivery,
//! request/response correlation, and the resilient-call surface that
//! composes retry, the circuit breaker, and the dedup cache.

use crate::breaker::{BreakerConfig, BreakerStats, CircuitBreaker};
use crate::capability::{AgentRegistryEntry, CapabilityRegistry};
use crate::dedup::{self, DedupCache};
use crate::error::BusError;
use crate::handler::AgentHandler;
use crate::queue;
use crate::retry::{self, RetryPolicy};
use cbp_codec::{StructuredMessage, Value};
use cbp_schema::{AgentId, MessageKind};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default size of the bounded message history ring buffer.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// How often the dedup cache sweeps expired entries, a periodic tick
/// applied here to cache hygiene instead of process supervision.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Bus-wide configuration: a plain struct with a `Default` impl carrying
/// the numeric defaults, no environment-variable layer.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    pub history_capacity: usize,
    pub breaker_config: BreakerConfig,
    pub dedup_ttl: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            breaker_config: BreakerConfig::default(),
            dedup_ttl: dedup::DEFAULT_TTL,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Which messages a [`Bus::history`] query returns. All fields default to
/// "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub sender: Option<AgentId>,
    pub receiver: Option<AgentId>,
    pub kind: Option<MessageKind>,
}

impl HistoryFilter {
    fn matches(&self, message: &StructuredMessage) -> bool {
        self.sender.map_or(true, |s| s == message.sender)
            && self.receiver.map_or(true, |r| r == message.receiver)
            && self.kind.map_or(true, |k| k == message.kind)
    }
}

/// Snapshot returned by [`Bus::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub registered_agents: usize,
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub handler_failures: u64,
    pub pending_requests: usize,
    pub history_len: usize,
}

#[derive(Default)]
struct Counters {
    messages_sent: AtomicU64,
    messages_delivered: AtomicU64,
    handler_failures: AtomicU64,
}

struct Inner {
    config: BusConfig,
    running: AtomicBool,
    senders: DashMap<AgentId, queue::Sender>,
    handlers: DashMap<AgentId, Arc<dyn AgentHandler>>,
    worker_handles: DashMap<AgentId, JoinHandle<()>>,
    /// Receivers for agents registered before `start()`; drained and
    /// spawned once the bus starts. If the bus is already running, a
    /// worker task is spawned immediately instead.
    parked: Mutex<HashMap<AgentId, queue::Receiver>>,
    pending: DashMap<String, oneshot::Sender<Result<StructuredMessage, BusError>>>,
    breakers: DashMap<(AgentId, AgentId), Arc<CircuitBreaker>>,
    dedup: DedupCache,
    capabilities: CapabilityRegistry,
    history: Mutex<VecDeque<StructuredMessage>>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
    counters: Counters,
}

/// A cheaply cloneable handle to the bus: an `Arc<Inner>` wrapper.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                running: AtomicBool::new(false),
                senders: DashMap::new(),
                handlers: DashMap::new(),
                worker_handles: DashMap::new(),
                parked: Mutex::new(HashMap::new()),
                pending: DashMap::new(),
                breakers: DashMap::new(),
                dedup: DedupCache::new(),
                capabilities: CapabilityRegistry::new(),
                history: Mutex::new(VecDeque::new()),
                sweep_handle: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// Registers a handler for `agent_id`, replacing any existing
    /// handler/queue for it.
    pub fn register(&self, agent_id: AgentId, handler: Arc<dyn AgentHandler>) {
        let (tx, rx) = queue::channel();
        self.inner.senders.insert(agent_id, tx);
        self.inner.handlers.insert(agent_id, handler);
        if self.inner.running.load(Ordering::Acquire) {
            self.spawn_worker(agent_id, rx);
        } else {
            self.inner.parked.lock().insert(agent_id, rx);
        }
        info!(?agent_id, "agent registered");
    }

    /// Removes `agent_id`'s handler and stops its worker.
    pub fn unregister(&self, agent_id: AgentId) {
        self.inner.senders.remove(&agent_id);
        self.inner.handlers.remove(&agent_id);
        self.inner.parked.lock().remove(&agent_id);
        if let Some((_, handle)) = self.inner.worker_handles.remove(&agent_id) {
            handle.abort();
        }
        info!(?agent_id, "agent unregistered");
    }

    /// Registers or replaces an agent's capability-discovery entry.
    pub fn register_capability(&self, entry: AgentRegistryEntry) {
        self.inner.capabilities.register(entry);
    }

    #[must_use]
    pub fn find_agents_for_capability(&self, name: &str) -> Vec<AgentId> {
        self.inner.capabilities.find_agents_for_capability(name)
    }

    #[must_use]
    pub fn best_agent_for_task(&self, required_capabilities: &[String]) -> Option<AgentId> {
        self.inner.capabilities.best_agent_for_task(required_capabilities)
    }

    /// Spawns workers for every agent registered before `start()` was
    /// called, then starts the dedup-cache sweep tick. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let parked: Vec<(AgentId, queue::Receiver)> = self.inner.parked.lock().drain().collect();
        for (agent_id, rx) in parked {
            self.spawn_worker(agent_id, rx);
        }

        let inner = Arc::clone(&self.inner);
        let sweep = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                inner.dedup.sweep_expired();
            }
        });
        *self.inner.sweep_handle.lock() = Some(sweep);
        info!("bus started");
    }

    /// Stops every worker and the sweep tick, and fails every pending
    /// promise with `bus_shutting_down`. The registry (breakers, dedup
    /// cache, capability table) is left intact, so the bus is safe to
    /// restart with `start()`.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        for entry in self.inner.worker_handles.iter() {
            entry.value().abort();
        }
        self.inner.worker_handles.clear();
        if let Some(handle) = self.inner.sweep_handle.lock().take() {
            handle.abort();
        }
        let pending_ids: Vec<String> = self.inner.pending.iter().map(|e| e.key().clone()).collect();
        for id in pending_ids {
            if let Some((_, tx)) = self.inner.pending.remove(&id) {
                let _ = tx.send(Err(BusError::BusShuttingDown));
            }
        }
        info!("bus stopped");
    }

    fn spawn_worker(&self, agent_id: AgentId, rx: queue::Receiver) {
        let Some(handler) = self.inner.handlers.get(&agent_id).map(|h| Arc::clone(&h)) else {
            warn!(?agent_id, "spawn_worker called with no registered handler");
            return;
        };
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            worker_loop(inner, agent_id, handler, rx).await;
        });
        self.inner.worker_handles.insert(agent_id, handle);
    }

    /// Routes to a concrete receiver's queue, or (broadcast receiver) to
    /// every registered agent except the sender.
    pub fn send(&self, message: StructuredMessage) -> Result<String, BusError> {
        self.inner.push_history(message.clone());
        self.inner.counters.messages_sent.fetch_add(1, Ordering::Relaxed);

        if message.receiver.is_broadcast() {
            for entry in self.inner.senders.iter() {
                let target = *entry.key();
                if target == message.sender {
                    continue;
                }
                if entry.value().send(message.priority, message.clone()).is_ok() {
                    self.inner.counters.messages_delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
            return Ok(message.message_id);
        }

        let sender = self
            .inner
            .senders
            .get(&message.receiver)
            .ok_or(BusError::AgentNotFound(message.receiver))?;
        sender
            .send(message.priority, message.clone())
            .map_err(|_| BusError::AgentNotFound(message.receiver))?;
        self.inner.counters.messages_delivered.fetch_add(1, Ordering::Relaxed);
        Ok(message.message_id)
    }

    /// Registers a pending-reply promise keyed by `request.message_id`,
    /// sends it, and awaits with `timeout`.
    /// A reply arriving after the timeout finds no pending entry and is
    /// discarded.
    pub async fn send_and_wait(
        &self,
        request: StructuredMessage,
        timeout: Duration,
    ) -> Result<StructuredMessage, BusError> {
        let message_id = request.message_id.clone();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(message_id.clone(), tx);

        if let Err(err) = self.send(request) {
            self.inner.pending.remove(&message_id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_canceled)) => Err(BusError::BusShuttingDown),
            Err(_elapsed) => {
                self.inner.pending.remove(&message_id);
                Err(BusError::Timeout)
            }
        }
    }

    /// Resilient request: fingerprint → cache lookup → breaker check →
    /// retry/backoff → record outcome.
    pub async fn resilient_request(
        &self,
        caller: AgentId,
        request: StructuredMessage,
        timeout: Duration,
        retry_policy: RetryPolicy,
        dedup_ttl: Option<Duration>,
    ) -> Result<StructuredMessage, BusError> {
        let callee = request.receiver;
        let fingerprint = dedup_ttl.map(|_| dedup::fingerprint(callee, &request.content));

        if let Some(fp) = fingerprint {
            if let Some(cached) = self.inner.dedup.get(fp) {
                debug!(?caller, ?callee, "resilient_request dedup cache hit");
                return Ok(cached);
            }
        }

        let breaker = self.breaker_for(caller, callee);
        if !breaker.can_execute() {
            warn!(?caller, ?callee, "circuit open, failing fast");
            return Err(BusError::CircuitOpen);
        }

        let result = retry::retry_with_backoff(&retry_policy, || {
            let req = request.clone();
            async { self.send_and_wait(req, timeout).await }
        })
        .await;

        match &result {
            Ok(reply) => {
                breaker.record_success();
                if let (Some(fp), Some(ttl)) = (fingerprint, dedup_ttl) {
                    self.inner.dedup.insert(fp, reply.clone(), ttl);
                }
            }
            Err(_) => breaker.record_failure(),
        }
        result
    }

    fn breaker_for(&self, caller: AgentId, callee: AgentId) -> Arc<CircuitBreaker> {
        self.inner
            .breakers
            .entry((caller, callee))
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.inner.config.breaker_config)))
            .clone()
    }

    #[must_use]
    pub fn breaker_stats(&self, caller: AgentId, callee: AgentId) -> Option<BreakerStats> {
        self.inner
            .breakers
            .get(&(caller, callee))
            .map(|b| b.stats())
    }

    /// Returns up to `limit` matching messages, most recent first.
    #[must_use]
    pub fn history(&self, filter: &HistoryFilter, limit: usize) -> Vec<StructuredMessage> {
        let history = self.inner.history.lock();
        history
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .take(limit)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            registered_agents: self.inner.handlers.len(),
            messages_sent: self.inner.counters.messages_sent.load(Ordering::Relaxed),
            messages_delivered: self.inner.counters.messages_delivered.load(Ordering::Relaxed),
            handler_failures: self.inner.counters.handler_failures.load(Ordering::Relaxed),
            pending_requests: self.inner.pending.len(),
            history_len: self.inner.history.lock().len(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl Inner {
    fn push_history(&self, message: StructuredMessage) {
        let mut history = self.history.lock();
        history.push_back(message);
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
    }

    /// A handler's return value is either a correlated reply (resolves a
    /// pending `send_and_wait` and is not re-enqueued) or a normal message
    /// to route.
    fn post_process(&self, bus: &Bus, reply: StructuredMessage) {
        if let Some(request_id) = reply.in_response_to.clone() {
            if let Some((_, tx)) = self.pending.remove(&request_id) {
                let result = if reply.kind == MessageKind::Error {
                    Err(extract_handler_error(&reply))
                } else {
                    Ok(reply)
                };
                let _ = tx.send(result);
                return;
            }
        }
        let _ = bus.send(reply);
    }

    fn record_handler_failure(&self, bus: &Bus, original: &StructuredMessage, err: BusError) {
        self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
        error!(sender = ?original.sender, message_id = %original.message_id, error = %err, "handler failed");
        let error_message = StructuredMessage::error(
            &original.message_id,
            original.receiver,
            original.sender,
            err.kind(),
            &err.to_string(),
        );
        self.post_process(bus, error_message);
    }
}

fn extract_handler_error(error_message: &StructuredMessage) -> BusError {
    let description = error_message
        .get_content("description")
        .and_then(Value::as_str)
        .unwrap_or("handler failed")
        .to_string();
    BusError::HandlerFailure(description)
}

async fn worker_loop(
    inner: Arc<Inner>,
    agent_id: AgentId,
    handler: Arc<dyn AgentHandler>,
    mut rx: queue::Receiver,
) {
    let bus = Bus { inner: Arc::clone(&inner) };
    debug!(?agent_id, "worker started");
    while let Some(message) = rx.recv().await {
        let outcome = std::panic::AssertUnwindSafe(handler.handle(message.clone()))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(Some(reply))) => inner.post_process(&bus, reply),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => inner.record_handler_failure(&bus, &message, err),
            Err(_panic) => inner.record_handler_failure(
                &bus,
                &message,
                BusError::HandlerFailure("handler panicked".to_string()),
            ),
        }
    }
    debug!(?agent_id, "worker stopped");
}
