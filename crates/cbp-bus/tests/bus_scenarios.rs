//! End-to-end bus scenarios: capability-based routing and broadcast
//! delivery, plus resilient-request composition.

use async_trait::async_trait;
use cbp_bus::{AgentHandler, BreakerConfig, Bus, BusConfig, BusError, RetryPolicy};
use cbp_codec::{StructuredMessage, Value};
use cbp_schema::AgentId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Echo;

#[async_trait]
impl AgentHandler for Echo {
    async fn handle(&self, message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
        Ok(Some(StructuredMessage::response(
            &message.message_id,
            message.receiver,
            message.sender,
            Value::Map(vec![(Value::from("result"), Value::from("ok"))]),
        )))
    }
}

struct Sleepy(Duration);

#[async_trait]
impl AgentHandler for Sleepy {
    async fn handle(&self, message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
        tokio::time::sleep(self.0).await;
        Ok(Some(StructuredMessage::response(
            &message.message_id,
            message.receiver,
            message.sender,
            Value::Map(vec![]),
        )))
    }
}

struct AlwaysFails;

#[async_trait]
impl AgentHandler for AlwaysFails {
    async fn handle(&self, _message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
        Err(BusError::Timeout)
    }
}

#[tokio::test]
async fn scenario_6_request_response_round_trip() {
    let bus = Bus::new(BusConfig::default());
    bus.register(AgentId::CODER, Arc::new(Echo));
    bus.start();

    let request = StructuredMessage::request(
        AgentId::ORCHESTRATOR,
        AgentId::CODER,
        Value::Map(vec![(Value::from("task"), Value::from("x"))]),
    );
    let request_id = request.message_id.clone();
    let reply = bus
        .send_and_wait(request, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(reply.in_response_to.as_deref(), Some(request_id.as_str()));
    assert_eq!(reply.get_content("result"), Some(&Value::from("ok")));
    bus.stop();
}

#[tokio::test]
async fn scenario_6_timeout_discards_late_reply() {
    let bus = Bus::new(BusConfig::default());
    bus.register(AgentId::CODER, Arc::new(Sleepy(Duration::from_millis(200))));
    bus.start();

    let request = StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, Value::Map(vec![]));
    let result = bus.send_and_wait(request, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(BusError::Timeout)));

    // The late reply must not wedge anything; give the handler time to
    // finish and resolve against an already-removed pending entry.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(bus.stats().pending_requests, 0);
    bus.stop();
}

#[tokio::test]
async fn handler_failure_surfaces_as_reply_error() {
    let bus = Bus::new(BusConfig::default());
    bus.register(AgentId::CODER, Arc::new(AlwaysFails));
    bus.start();

    let request = StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, Value::Map(vec![]));
    let result = bus.send_and_wait(request, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(BusError::HandlerFailure(_))));
    assert_eq!(bus.stats().handler_failures, 1);
    bus.stop();
}

#[tokio::test]
async fn scenario_7_circuit_breaker_trip_and_probe_recovery() {
    let bus = Bus::new(BusConfig {
        breaker_config: BreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(100),
            half_open_probes: 1,
        },
        ..BusConfig::default()
    });
    bus.register(AgentId::CODER, Arc::new(AlwaysFails));
    bus.start();

    let retry = RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    };

    for _ in 0..3 {
        let request = StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, Value::Map(vec![]));
        let _ = bus
            .resilient_request(
                AgentId::ORCHESTRATOR,
                request,
                Duration::from_millis(200),
                retry,
                None,
            )
            .await;
    }

    let stats = bus.breaker_stats(AgentId::ORCHESTRATOR, AgentId::CODER).unwrap();
    assert_eq!(stats.state, cbp_bus::BreakerState::Open);

    let fast_fail = StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, Value::Map(vec![]));
    let result = bus
        .resilient_request(
            AgentId::ORCHESTRATOR,
            fast_fail,
            Duration::from_millis(200),
            retry,
            None,
        )
        .await;
    assert!(matches!(result, Err(BusError::CircuitOpen)));

    bus.stop();
}

#[tokio::test]
async fn broadcast_reaches_every_agent_except_sender() {
    let bus = Bus::new(BusConfig::default());
    let received = Arc::new(AtomicU32::new(0));

    struct Counter(Arc<AtomicU32>);
    #[async_trait]
    impl AgentHandler for Counter {
        async fn handle(&self, _message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    bus.register(AgentId::CODER, Arc::new(Counter(Arc::clone(&received))));
    bus.register(AgentId::REVIEWER, Arc::new(Counter(Arc::clone(&received))));
    bus.register(AgentId::ORCHESTRATOR, Arc::new(Counter(Arc::clone(&received))));
    bus.start();

    let broadcast = StructuredMessage::notification(AgentId::ORCHESTRATOR, AgentId::BROADCAST, Value::Map(vec![]));
    bus.send(broadcast).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received.load(Ordering::SeqCst), 2); // CODER and REVIEWER, not the sender
    bus.stop();
}

#[tokio::test]
async fn resilient_request_dedup_cache_short_circuits_repeat_calls() {
    let bus = Bus::new(BusConfig::default());
    let call_count = Arc::new(AtomicU32::new(0));

    struct Counting(Arc<AtomicU32>);
    #[async_trait]
    impl AgentHandler for Counting {
        async fn handle(&self, message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(StructuredMessage::response(
                &message.message_id,
                message.receiver,
                message.sender,
                Value::Map(vec![(Value::from("result"), Value::from("ok"))]),
            )))
        }
    }

    bus.register(AgentId::CODER, Arc::new(Counting(Arc::clone(&call_count))));
    bus.start();

    let content = Value::Map(vec![(Value::from("task"), Value::from("repeat-me"))]);
    for _ in 0..3 {
        let request = StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, content.clone());
        let reply = bus
            .resilient_request(
                AgentId::ORCHESTRATOR,
                request,
                Duration::from_secs(1),
                RetryPolicy::default(),
                Some(Duration::from_secs(10)),
            )
            .await
            .unwrap();
        assert_eq!(reply.get_content("result"), Some(&Value::from("ok")));
    }

    assert_eq!(call_count.load(Ordering::SeqCst), 1, "only the first call should reach the handler");
    bus.stop();
}
