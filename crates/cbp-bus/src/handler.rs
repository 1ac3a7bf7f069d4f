//! Handler trait invoked by an agent's worker task.

use crate::error::BusError;
use async_trait::async_trait;
use cbp_codec::StructuredMessage;

/// Implemented once per registered agent. A handler either replies (the
/// returned message is post-processed by the bus — resolved against a
/// pending promise, or routed as a normal send), declines to reply
/// (`Ok(None)`), or fails (`Err`), in which case the bus builds and routes
/// an `error`-kind message back to the original sender on the handler's
/// behalf.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn handle(&self, message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError>;
}

/// Adapts a plain async closure into an [`AgentHandler`], for tests and
/// small integrations that don't need a dedicated type.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> AgentHandler for FnHandler<F>
where
    F: Fn(StructuredMessage) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<StructuredMessage>, BusError>> + Send,
{
    async fn handle(&self, message: StructuredMessage) -> Result<Option<StructuredMessage>, BusError> {
        (self.0)(message).await
    }
}
