//! One-shot timers.
//!
//! Every timer carries an id so the core can cancel it. The shell answers
//! `After` with `Elapsed` when the delay passes, or with `Cancelled` if a
//! matching `Cancel` arrived first; only `Elapsed` reaches the app.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op")]
pub enum TickerOperation {
    After { timer_id: TimerId, millis: u64 },
    Cancel { timer_id: TimerId },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TickerOutput {
    Elapsed,
    Cancelled,
}

impl Operation for TickerOperation {
    type Output = TickerOutput;
}

pub struct Ticker<E> {
    context: CapabilityContext<TickerOperation, E>,
}

impl<Ev> Capability<Ev> for Ticker<Ev> {
    type Operation = TickerOperation;
    type MappedSelf<MappedEv> = Ticker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Ticker::new(self.context.map_event(f))
    }
}

impl<E> Ticker<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<TickerOperation, E>) -> Self {
        Self { context }
    }

    /// Delivers `event` once `delay` has passed, unless cancelled.
    pub fn after(&self, timer_id: TimerId, delay: Duration, event: E) {
        let millis = crate::duration_to_millis(delay);
        let ctx = self.context.clone();
        self.context.spawn(async move {
            match ctx
                .request_from_shell(TickerOperation::After { timer_id, millis })
                .await
            {
                TickerOutput::Elapsed => ctx.update_app(event),
                TickerOutput::Cancelled => {}
            }
        });
    }

    pub fn cancel(&self, timer_id: TimerId) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(TickerOperation::Cancel { timer_id }).await;
        });
    }
}
