use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::guidance::{GuidanceError, NearbyFacilities};
use crate::location::LocationError;
use crate::model::{Coordinates, FailureType, IncidentId, SessionId, UserProfile};
use crate::protocols::Category;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VictimChoice {
    Myself,
    ThirdParty,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Noop,

    // --- Shell lifecycle ---
    AppStarted {
        #[serde(default)]
        config: Option<AssistantConfig>,
    },
    ProfileUpdated(UserProfile),
    NetworkStatusChanged {
        online: bool,
    },

    // --- Emergency flow (user) ---
    EmergencyStarted,
    VictimSelected(VictimChoice),
    CategorySelected(Category),
    SubCategorySelected {
        label: Option<String>,
        description: Option<String>,
        #[serde(default, with = "serde_bytes")]
        image: Option<Vec<u8>>,
    },
    NavigateBack,
    EmergencyCancelled,
    ActionToggled {
        step_id: String,
    },
    AutoCallCancelled,
    EmergencyCallRequested,
    FailureReportingOpened,
    FailureReportingClosed,
    FailureReported(FailureType),
    EmergencyFinalized,

    // --- Capability completions, tagged with their session ---
    Tick {
        session: SessionId,
    },
    GuidanceResolved {
        session: SessionId,
        generation: u64,
        result: Result<String, GuidanceError>,
    },
    GuidanceDeadlineElapsed {
        session: SessionId,
        generation: u64,
    },
    PositionResolved {
        session: Option<SessionId>,
        result: Result<Coordinates, LocationError>,
    },
    AddressResolved {
        session: SessionId,
        coords: Coordinates,
        result: Result<String, LocationError>,
    },

    // --- Dashboard ---
    NearbyFacilitiesRequested,
    NearbyFacilitiesResolved(Result<NearbyFacilities, GuidanceError>),
    DossierShareRequested {
        incident_id: IncidentId,
    },

    DismissError,
    DismissNotice,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted { .. } => "app_started",
            Self::ProfileUpdated(_) => "profile_updated",
            Self::NetworkStatusChanged { .. } => "network_status_changed",
            Self::EmergencyStarted => "emergency_started",
            Self::VictimSelected(_) => "victim_selected",
            Self::CategorySelected(_) => "category_selected",
            Self::SubCategorySelected { .. } => "sub_category_selected",
            Self::NavigateBack => "navigate_back",
            Self::EmergencyCancelled => "emergency_cancelled",
            Self::ActionToggled { .. } => "action_toggled",
            Self::AutoCallCancelled => "auto_call_cancelled",
            Self::EmergencyCallRequested => "emergency_call_requested",
            Self::FailureReportingOpened => "failure_reporting_opened",
            Self::FailureReportingClosed => "failure_reporting_closed",
            Self::FailureReported(_) => "failure_reported",
            Self::EmergencyFinalized => "emergency_finalized",
            Self::Tick { .. } => "tick",
            Self::GuidanceResolved { .. } => "guidance_resolved",
            Self::GuidanceDeadlineElapsed { .. } => "guidance_deadline_elapsed",
            Self::PositionResolved { .. } => "position_resolved",
            Self::AddressResolved { .. } => "address_resolved",
            Self::NearbyFacilitiesRequested => "nearby_facilities_requested",
            Self::NearbyFacilitiesResolved(_) => "nearby_facilities_resolved",
            Self::DossierShareRequested { .. } => "dossier_share_requested",
            Self::DismissError => "dismiss_error",
            Self::DismissNotice => "dismiss_notice",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::EmergencyStarted
                | Self::VictimSelected(_)
                | Self::CategorySelected(_)
                | Self::SubCategorySelected { .. }
                | Self::NavigateBack
                | Self::EmergencyCancelled
                | Self::ActionToggled { .. }
                | Self::AutoCallCancelled
                | Self::EmergencyCallRequested
                | Self::FailureReportingOpened
                | Self::FailureReportingClosed
                | Self::FailureReported(_)
                | Self::EmergencyFinalized
                | Self::NearbyFacilitiesRequested
                | Self::DossierShareRequested { .. }
                | Self::DismissError
                | Self::DismissNotice
        )
    }

    /// High-frequency events logged at trace level.
    #[must_use]
    pub const fn is_periodic(&self) -> bool {
        matches!(self, Self::Tick { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_initiated_classification() {
        assert!(!Event::Noop.is_user_initiated());
        assert!(!Event::AppStarted { config: None }.is_user_initiated());
        assert!(Event::EmergencyStarted.is_user_initiated());
        assert!(Event::AutoCallCancelled.is_user_initiated());
        assert!(!Event::Tick {
            session: SessionId::new("s")
        }
        .is_user_initiated());
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(Event::EmergencyFinalized.name(), "emergency_finalized");
        assert_eq!(
            Event::GuidanceDeadlineElapsed {
                session: SessionId::new("s"),
                generation: 1
            }
            .name(),
            "guidance_deadline_elapsed"
        );
    }

    #[test]
    fn sub_category_event_accepts_missing_image() {
        let event: Event = serde_json::from_str(
            r#"{"SubCategorySelected":{"label":"Afogamento","description":null}}"#,
        )
        .expect("parse");
        assert_eq!(
            event,
            Event::SubCategorySelected {
                label: Some("Afogamento".into()),
                description: None,
                image: None,
            }
        );
    }
}
