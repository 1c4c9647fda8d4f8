//! ScheduledJob port - work invoked on every tick of a recurring timer.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::dispatch::JobRunContext;
use crate::domain::foundation::HandlerError;

/// A job driven by a timer instead of the message bus.
///
/// A failed tick is logged by the scheduler and the next tick runs as usual.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn tick(&self, ctx: &JobRunContext) -> Result<(), HandlerError>;

    /// Time between two ticks.
    fn interval(&self) -> Duration;

    fn name(&self) -> &'static str;
}
