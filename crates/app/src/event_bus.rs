//! In-process outcome bus backed by a tokio broadcast channel.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use pwm_domain::error::PwmError;

use crate::controller::TickOutcome;
use crate::ports::OutcomePublisher;

/// Fans tick outcomes out to any number of in-process subscribers
/// (logging, the virtual hydraulics, an actuation adapter).
///
/// Publishing succeeds even when there are no active subscribers
/// (the outcome is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<Arc<TickOutcome>>,
}

impl InProcessEventBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to outcomes published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TickOutcome>> {
        self.sender.subscribe()
    }
}

impl OutcomePublisher for InProcessEventBus {
    fn publish(
        &self,
        outcome: Arc<TickOutcome>,
    ) -> impl Future<Output = Result<(), PwmError>> + Send {
        // send only fails without receivers
        let _ = self.sender.send(outcome);
        async { Ok(()) }
    }
}
