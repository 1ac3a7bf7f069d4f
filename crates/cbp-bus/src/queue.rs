//! Per-agent priority queue.
//!
//! Four `tokio::sync::mpsc::unbounded_channel` lanes, one per
//! [`Priority`](cbp_schema::Priority) class. The worker side drains with a
//! `biased` `tokio::select!` so an already-enqueued higher-priority message
//! always wins at the next dequeue point, without starving lower lanes
//! indefinitely (a lower lane is only skipped while a higher one has
//! something ready *right now*).

use cbp_codec::StructuredMessage;
use cbp_schema::Priority;
use tokio::sync::mpsc;

/// The sending half, held by every producer targeting this agent.
#[derive(Clone)]
pub struct Sender {
    critical: mpsc::UnboundedSender<StructuredMessage>,
    high: mpsc::UnboundedSender<StructuredMessage>,
    normal: mpsc::UnboundedSender<StructuredMessage>,
    low: mpsc::UnboundedSender<StructuredMessage>,
}

impl Sender {
    /// Enqueues `message` on the lane matching `priority`. Fails only if
    /// the agent's single worker has stopped without `unregister` tearing
    /// down this sender first.
    pub fn send(&self, priority: Priority, message: StructuredMessage) -> Result<(), StructuredMessage> {
        let result = match priority {
            Priority::Critical => self.critical.send(message),
            Priority::High => self.high.send(message),
            Priority::Normal => self.normal.send(message),
            Priority::Low => self.low.send(message),
        };
        result.map_err(|e| e.0)
    }
}

/// The receiving half, owned exclusively by one agent's worker task.
pub struct Receiver {
    critical: mpsc::UnboundedReceiver<StructuredMessage>,
    high: mpsc::UnboundedReceiver<StructuredMessage>,
    normal: mpsc::UnboundedReceiver<StructuredMessage>,
    low: mpsc::UnboundedReceiver<StructuredMessage>,
}

impl Receiver {
    /// Waits for the next message, always preferring a higher-priority
    /// lane over a lower one when both have something ready.
    pub async fn recv(&mut self) -> Option<StructuredMessage> {
        tokio::select! {
            biased;
            Some(m) = self.critical.recv() => Some(m),
            Some(m) = self.high.recv() => Some(m),
            Some(m) = self.normal.recv() => Some(m),
            Some(m) = self.low.recv() => Some(m),
            else => None,
        }
    }
}

/// Creates a fresh four-lane queue for one agent.
#[must_use]
pub fn channel() -> (Sender, Receiver) {
    let (critical_tx, critical_rx) = mpsc::unbounded_channel();
    let (high_tx, high_rx) = mpsc::unbounded_channel();
    let (normal_tx, normal_rx) = mpsc::unbounded_channel();
    let (low_tx, low_rx) = mpsc::unbounded_channel();
    (
        Sender {
            critical: critical_tx,
            high: high_tx,
            normal: normal_tx,
            low: low_tx,
        },
        Receiver {
            critical: critical_rx,
            high: high_rx,
            normal: normal_rx,
            low: low_rx,
        },
    )
}
