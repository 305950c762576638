use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::location::LocationError;
use crate::model::Coordinates;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op")]
pub enum GeolocationOperation {
    CurrentPosition { timeout_ms: u64, high_accuracy: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GeolocationOutput {
    Position {
        lat: f64,
        lng: f64,
        #[serde(default)]
        accuracy_m: Option<f64>,
    },
    PermissionDenied,
    Timeout,
    Unavailable { reason: String },
}

impl GeolocationOutput {
    pub fn into_coordinates(self) -> Result<Coordinates, LocationError> {
        match self {
            Self::Position { lat, lng, .. } => Coordinates::new(lat, lng),
            Self::PermissionDenied => Err(LocationError::PermissionDenied),
            Self::Timeout => Err(LocationError::Timeout),
            Self::Unavailable { reason } => Err(LocationError::Unavailable(reason)),
        }
    }
}

impl Operation for GeolocationOperation {
    type Output = GeolocationOutput;
}

pub struct Geolocation<E> {
    context: CapabilityContext<GeolocationOperation, E>,
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<E> Geolocation<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, E>) -> Self {
        Self { context }
    }

    /// Single position fix. Never retried; a failure is reported once.
    pub fn current_position<F>(&self, timeout: Duration, make_event: F)
    where
        F: FnOnce(Result<Coordinates, LocationError>) -> E + Send + 'static,
    {
        let operation = GeolocationOperation::CurrentPosition {
            timeout_ms: crate::duration_to_millis(timeout),
            high_accuracy: true,
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(output.into_coordinates()));
        });
    }
}
