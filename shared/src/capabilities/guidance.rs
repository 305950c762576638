//! Guidance resolver port.
//!
//! The shell forwards the request to the model provider and hands back the
//! raw response text. Timeouts are enforced by the core, not here.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::guidance::{GuidanceError, GuidanceRequest, NearbyFacilities, NEARBY_QUERY};
use crate::model::Coordinates;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "data")]
pub enum GuidanceOperation {
    Resolve(GuidanceRequest),
    FindNearby {
        model: String,
        query: String,
        lat: f64,
        lng: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GuidanceOutput {
    Completed { text: String },
    Nearby(NearbyFacilities),
    Failed { reason: String },
}

impl GuidanceOutput {
    pub fn into_text(self) -> Result<String, GuidanceError> {
        match self {
            Self::Completed { text } => Ok(text),
            Self::Failed { reason } => Err(GuidanceError::Unavailable(reason)),
            Self::Nearby(_) => Err(GuidanceError::MalformedResponse(
                "expected protocol text, got facilities".into(),
            )),
        }
    }

    pub fn into_facilities(self) -> Result<NearbyFacilities, GuidanceError> {
        match self {
            Self::Nearby(facilities) => Ok(facilities),
            Self::Failed { reason } => Err(GuidanceError::Unavailable(reason)),
            Self::Completed { .. } => Err(GuidanceError::MalformedResponse(
                "expected facilities, got protocol text".into(),
            )),
        }
    }
}

impl Operation for GuidanceOperation {
    type Output = GuidanceOutput;
}

pub struct Guidance<E> {
    context: CapabilityContext<GuidanceOperation, E>,
}

impl<Ev> Capability<Ev> for Guidance<Ev> {
    type Operation = GuidanceOperation;
    type MappedSelf<MappedEv> = Guidance<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Guidance::new(self.context.map_event(f))
    }
}

impl<E> Guidance<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<GuidanceOperation, E>) -> Self {
        Self { context }
    }

    pub fn resolve<F>(&self, request: GuidanceRequest, make_event: F)
    where
        F: FnOnce(Result<String, GuidanceError>) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx
                .request_from_shell(GuidanceOperation::Resolve(request))
                .await;
            ctx.update_app(make_event(output.into_text()));
        });
    }

    pub fn find_nearby<F>(&self, model: &str, coords: Coordinates, make_event: F)
    where
        F: FnOnce(Result<NearbyFacilities, GuidanceError>) -> E + Send + 'static,
    {
        let operation = GuidanceOperation::FindNearby {
            model: model.to_string(),
            query: NEARBY_QUERY.to_string(),
            lat: coords.lat,
            lng: coords.lng,
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(output.into_facilities()));
        });
    }
}
