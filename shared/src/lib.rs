// lib.rs - VIDA 360 emergency assistant core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod checklist;
pub mod config;
pub mod escalation;
pub mod event;
pub mod guidance;
pub mod incident;
pub mod location;
pub mod model;
pub mod protocols;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use app::{App, Capabilities, Effect, Model, ViewModel};
pub use config::AssistantConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;

use crate::config::ConfigError;
use crate::guidance::GuidanceError;
use crate::location::LocationError;
use crate::session::SessionError;

pub const DEFAULT_EMERGENCY_NUMBER: &str = "192";
pub const AUTO_CALL_COUNTDOWN_START: u8 = 10;
pub const MIN_AUTO_CALL_COUNTDOWN: u8 = 3;
pub const MAX_AUTO_CALL_COUNTDOWN: u8 = 60;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const RESOLVER_TIMEOUT: Duration = Duration::from_secs(9);
pub const MIN_RESOLVER_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_RESOLVER_TIMEOUT: Duration = Duration::from_secs(30);
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const COMPRESSIONS_PER_MINUTE: u32 = 110;
pub const MAX_FREE_TEXT_LEN: usize = 1000;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_HISTORY_ENTRIES: usize = 200;
pub const DEFAULT_GUIDANCE_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_REVERSE_GEOCODE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_USER_AGENT: &str = "vida360-core/0.1";

pub const ADDRESS_LOCATING: &str = "Localizando...";
pub const ADDRESS_UNKNOWN: &str = "Endereço não identificado";
pub const ADDRESS_OFFLINE: &str = "Coordenadas GPS disponíveis (Offline)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    InvalidState,
    ResolverTimeout,
    ResolverFailure,
    LocationUnavailable,
    NetworkUnavailable,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidState => "INVALID_STATE",
            Self::ResolverTimeout => "RESOLVER_TIMEOUT",
            Self::ResolverFailure => "RESOLVER_FAILURE",
            Self::LocationUnavailable => "LOCATION_UNAVAILABLE",
            Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::ResolverTimeout
            | Self::ResolverFailure
            | Self::LocationUnavailable
            | Self::NetworkUnavailable => ErrorSeverity::Transient,

            Self::InvalidInput | Self::InvalidState => ErrorSeverity::Permanent,

            Self::Internal => ErrorSeverity::Fatal,
        }
    }

    /// Whether guidance keeps flowing from a local source after this error.
    #[must_use]
    pub const fn keeps_local_guidance(self) -> bool {
        matches!(
            self,
            Self::ResolverTimeout | Self::ResolverFailure | Self::NetworkUnavailable
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::InvalidInput => {
                "Selecione uma opção válida para continuar.".into()
            }
            ErrorKind::InvalidState => {
                "Esta ação não está disponível neste momento do atendimento.".into()
            }
            ErrorKind::ResolverTimeout | ErrorKind::ResolverFailure => {
                "A IA não respondeu. Continue seguindo o protocolo local.".into()
            }
            ErrorKind::LocationUnavailable => {
                "Não foi possível obter a localização. Continue o atendimento.".into()
            }
            ErrorKind::NetworkUnavailable => {
                "Sem conexão. Protocolos locais de emergência ativos.".into()
            }
            ErrorKind::Internal => {
                "Ocorreu um erro inesperado. Continue seguindo as instruções na tela.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let kind = match &e {
            SessionError::InvalidInput(_) => ErrorKind::InvalidInput,
            SessionError::InvalidTransition { .. } | SessionError::NoSession => {
                ErrorKind::InvalidState
            }
            SessionError::NetworkUnavailable => ErrorKind::NetworkUnavailable,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<GuidanceError> for AppError {
    fn from(e: GuidanceError) -> Self {
        let kind = match &e {
            GuidanceError::Timeout => ErrorKind::ResolverTimeout,
            GuidanceError::Offline => ErrorKind::NetworkUnavailable,
            GuidanceError::Unavailable(_) | GuidanceError::MalformedResponse(_) => {
                ErrorKind::ResolverFailure
            }
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        AppError::new(ErrorKind::LocationUnavailable, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::InvalidInput, e.to_string()).with_context("source", "config")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Session clock as shown in the header, `m:ss`.
#[must_use]
pub fn format_elapsed(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[must_use]
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
