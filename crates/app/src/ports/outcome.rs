//! Outcome port: hands each tick's result to the actuation layer.

use std::future::Future;
use std::sync::Arc;

use pwm_domain::error::PwmError;

use crate::controller::TickOutcome;

/// Publishes tick outcomes to whoever renders or actuates them.
pub trait OutcomePublisher {
    /// Publish the outcome of one tick.
    fn publish(
        &self,
        outcome: Arc<TickOutcome>,
    ) -> impl Future<Output = Result<(), PwmError>> + Send;
}

impl<T: OutcomePublisher + Send + Sync> OutcomePublisher for Arc<T> {
    fn publish(
        &self,
        outcome: Arc<TickOutcome>,
    ) -> impl Future<Output = Result<(), PwmError>> + Send {
        (**self).publish(outcome)
    }
}
