use serde::{Deserialize, Serialize};
use std::fmt;

use crate::get_current_time_ms;
use crate::location::LocationError;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(SessionId);
typed_id!(IncidentId);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl IncidentId {
    /// `BR-` followed by nine uppercase alphanumerics.
    #[must_use]
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("BR-{}", &raw[..9]))
    }
}

/// Explicit timestamp unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(get_current_time_ms())
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

/// Validated WGS84 position.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, LocationError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(LocationError::InvalidCoordinates { lat, lng });
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(LocationError::InvalidCoordinates { lat, lng });
        }
        Ok(Self { lat, lng })
    }
}

// --- Operator profile ---

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: String,
    pub age: u16,
    pub blood_type: String,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub emergency_contacts: Vec<EmergencyContact>,
}

impl UserProfile {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            name: self.name.trim().to_string(),
            age: self.age,
            blood_type: self.blood_type.trim().to_string(),
            allergies: self.allergies.clone(),
            medications: self.medications.clone(),
        }
    }
}

/// Medical facts copied out of the profile when the operator is the victim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub name: String,
    pub age: u16,
    pub blood_type: String,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
}

fn joined_or_none(items: &[String]) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        "Nenhuma".to_string()
    } else {
        items.join(", ")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum VictimContext {
    #[serde(rename = "SELF")]
    Myself { profile: ProfileSnapshot },
    #[serde(rename = "THIRD_PARTY")]
    ThirdParty,
}

impl VictimContext {
    /// `None` when there is no usable profile to describe the operator.
    #[must_use]
    pub fn for_operator(profile: &UserProfile) -> Option<Self> {
        profile.is_complete().then(|| Self::Myself {
            profile: profile.snapshot(),
        })
    }

    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Myself { .. })
    }

    /// Victim description handed to the guidance resolver.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Myself { profile } => format!(
                "Vítima: {} ({} anos). Sangue: {}. Alergias: {}.",
                profile.name,
                profile.age,
                if profile.blood_type.is_empty() {
                    "Não informado"
                } else {
                    profile.blood_type.as_str()
                },
                joined_or_none(&profile.allergies),
            ),
            Self::ThirdParty => "Vítima: TERCEIRO (Desconhecido).".to_string(),
        }
    }
}

// --- Protocols ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Critical,
    High,
    Moderate,
    Low,
}

impl Criticality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Moderate => "MODERATE",
            Self::Low => "LOW",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Action,
    Check,
    Alert,
    Critical,
}

impl StepKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Check => "check",
            Self::Alert => "alert",
            Self::Critical => "critical",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolStep {
    #[serde(default)]
    pub id: String,
    pub instruction: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
}

/// A step as tracked during a session, with its completion flag.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub id: String,
    pub instruction: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub completed: bool,
}

impl From<&ProtocolStep> for ActionStep {
    fn from(step: &ProtocolStep) -> Self {
        Self {
            id: step.id.clone(),
            instruction: step.instruction.clone(),
            kind: step.kind,
            completed: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub emergency_type: String,
    pub criticality: Criticality,
    pub immediate_instruction: String,
    pub is_cardiac_arrest: bool,
    #[serde(rename = "nextSteps")]
    pub steps: Vec<ProtocolStep>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolSource {
    /// Curated local table entry.
    Offline,
    /// Generic local protocol for unmapped situations.
    Fallback,
    /// Refined by the guidance resolver.
    Resolver,
}

// --- Institutional failures ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    DelayedResponse,
    CommunicationError,
    EquipmentMissing,
    RefusalOfCare,
    UnprofessionalConduct,
}

impl FailureType {
    pub const ALL: [Self; 5] = [
        Self::DelayedResponse,
        Self::CommunicationError,
        Self::EquipmentMissing,
        Self::RefusalOfCare,
        Self::UnprofessionalConduct,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DelayedResponse => "SAMU/Bombeiro Não Chegou",
            Self::CommunicationError => "Erro na Central 192/193",
            Self::EquipmentMissing => "Falta de Material no Resgate",
            Self::RefusalOfCare => "Negligência / Omissão de Socorro",
            Self::UnprofessionalConduct => "Conduta Inadequada da Equipe",
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DelayedResponse => "DELAYED_RESPONSE",
            Self::CommunicationError => "COMMUNICATION_ERROR",
            Self::EquipmentMissing => "EQUIPMENT_MISSING",
            Self::RefusalOfCare => "REFUSAL_OF_CARE",
            Self::UnprofessionalConduct => "UNPROFESSIONAL_CONDUCT",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnnotation {
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    pub description: String,
    pub response_time_seconds: Option<u32>,
}

impl FailureAnnotation {
    /// `elapsed_secs` is the session clock at the moment of the report.
    #[must_use]
    pub fn record(failure_type: FailureType, elapsed_secs: u32) -> Self {
        Self {
            failure_type,
            description: failure_type.label().to_string(),
            response_time_seconds: Some(elapsed_secs),
        }
    }
}

// --- Location ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSnapshot {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}
