use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{
    AUTO_CALL_COUNTDOWN_START, DEFAULT_EMERGENCY_NUMBER, DEFAULT_GUIDANCE_MODEL,
    DEFAULT_REVERSE_GEOCODE_URL, DEFAULT_USER_AGENT, LOCATION_TIMEOUT, MAX_AUTO_CALL_COUNTDOWN,
    MAX_RESOLVER_TIMEOUT, MIN_AUTO_CALL_COUNTDOWN, MIN_RESOLVER_TIMEOUT, RESOLVER_TIMEOUT,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("emergency number must be digits only, got {0:?}")]
    InvalidEmergencyNumber(String),
    #[error("invalid reverse geocode url {url:?}: {reason}")]
    InvalidGeocodeUrl { url: String, reason: String },
    #[error("guidance model must not be empty")]
    EmptyModel,
}

/// Runtime settings, supplied by the shell at startup.
///
/// Every field has a default so a partial JSON object is accepted.
/// Numeric values are clamped into safe ranges by [`AssistantConfig::validated`].
/// The session tick is fixed at [`crate::TICK_INTERVAL`] and is not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantConfig {
    pub emergency_number: String,
    pub auto_call_countdown: u8,
    pub resolver_timeout_ms: u64,
    pub location_timeout_ms: u64,
    pub guidance_model: String,
    pub reverse_geocode_url: String,
    pub user_agent: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            emergency_number: DEFAULT_EMERGENCY_NUMBER.into(),
            auto_call_countdown: AUTO_CALL_COUNTDOWN_START,
            resolver_timeout_ms: crate::duration_to_millis(RESOLVER_TIMEOUT),
            location_timeout_ms: crate::duration_to_millis(LOCATION_TIMEOUT),
            guidance_model: DEFAULT_GUIDANCE_MODEL.into(),
            reverse_geocode_url: DEFAULT_REVERSE_GEOCODE_URL.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl AssistantConfig {
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.emergency_number = self.emergency_number.trim().to_string();
        if self.emergency_number.is_empty()
            || !self.emergency_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidEmergencyNumber(self.emergency_number));
        }

        if let Err(e) = Url::parse(&self.reverse_geocode_url) {
            return Err(ConfigError::InvalidGeocodeUrl {
                url: self.reverse_geocode_url,
                reason: e.to_string(),
            });
        }

        self.guidance_model = self.guidance_model.trim().to_string();
        if self.guidance_model.is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        self.auto_call_countdown = self
            .auto_call_countdown
            .clamp(MIN_AUTO_CALL_COUNTDOWN, MAX_AUTO_CALL_COUNTDOWN);
        self.resolver_timeout_ms = self.resolver_timeout_ms.clamp(
            crate::duration_to_millis(MIN_RESOLVER_TIMEOUT),
            crate::duration_to_millis(MAX_RESOLVER_TIMEOUT),
        );
        self.location_timeout_ms = self.location_timeout_ms.clamp(1_000, 60_000);
        if self.user_agent.trim().is_empty() {
            self.user_agent = DEFAULT_USER_AGENT.into();
        }
        Ok(self)
    }

    #[must_use]
    pub const fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    #[must_use]
    pub const fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_national_service() {
        let config = AssistantConfig::default().validated().expect("defaults are valid");
        assert_eq!(config.emergency_number, "192");
        assert_eq!(config.auto_call_countdown, 10);
        assert_eq!(config.resolver_timeout(), Duration::from_secs(9));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AssistantConfig =
            serde_json::from_str(r#"{"emergencyNumber":"193"}"#).expect("parse");
        assert_eq!(config.emergency_number, "193");
        assert_eq!(config.auto_call_countdown, AUTO_CALL_COUNTDOWN_START);
        assert_eq!(config.guidance_model, DEFAULT_GUIDANCE_MODEL);
    }

    #[test]
    fn tick_interval_is_not_configurable() {
        let config: AssistantConfig =
            serde_json::from_str(r#"{"tickIntervalMs":100}"#).expect("unknown keys are ignored");
        assert_eq!(config, AssistantConfig::default());
    }

    #[test]
    fn clamps_out_of_range_values() {
        let config = AssistantConfig {
            auto_call_countdown: 0,
            resolver_timeout_ms: 120_000,
            ..AssistantConfig::default()
        }
        .validated()
        .expect("valid");
        assert_eq!(config.auto_call_countdown, MIN_AUTO_CALL_COUNTDOWN);
        assert_eq!(config.resolver_timeout(), MAX_RESOLVER_TIMEOUT);
    }

    #[test]
    fn rejects_bad_number_and_url() {
        let bad_number = AssistantConfig {
            emergency_number: "19x".into(),
            ..AssistantConfig::default()
        };
        assert!(matches!(
            bad_number.validated(),
            Err(ConfigError::InvalidEmergencyNumber(_))
        ));

        let bad_url = AssistantConfig {
            reverse_geocode_url: "not a url".into(),
            ..AssistantConfig::default()
        };
        assert!(matches!(
            bad_url.validated(),
            Err(ConfigError::InvalidGeocodeUrl { .. })
        ));
    }
}
