use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// The shell opens `tel:{number}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialOperation {
    pub number: String,
}

impl Operation for DialOperation {
    type Output = ();
}

pub struct Dialer<E> {
    context: CapabilityContext<DialOperation, E>,
}

impl<Ev> Capability<Ev> for Dialer<Ev> {
    type Operation = DialOperation;
    type MappedSelf<MappedEv> = Dialer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Dialer::new(self.context.map_event(f))
    }
}

impl<E> Dialer<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<DialOperation, E>) -> Self {
        Self { context }
    }

    pub fn dial(&self, number: impl Into<String>) {
        let operation = DialOperation {
            number: number.into(),
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
