use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Native share sheet. Shells without one copy `text` to the clipboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareOperation {
    pub title: String,
    pub text: String,
}

impl Operation for ShareOperation {
    type Output = ();
}

pub struct Share<E> {
    context: CapabilityContext<ShareOperation, E>,
}

impl<Ev> Capability<Ev> for Share<Ev> {
    type Operation = ShareOperation;
    type MappedSelf<MappedEv> = Share<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Share::new(self.context.map_event(f))
    }
}

impl<E> Share<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<ShareOperation, E>) -> Self {
        Self { context }
    }

    pub fn share(&self, title: impl Into<String>, text: impl Into<String>) {
        let operation = ShareOperation {
            title: title.into(),
            text: text.into(),
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
