use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::{Coordinates, LocationSnapshot};
use crate::{ADDRESS_LOCATING, ADDRESS_OFFLINE, ADDRESS_UNKNOWN};

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("reverse geocoding failed: {0}")]
    Geocoding(String),
    #[error("reverse geocoding returned no address")]
    AddressNotFound,
}

/// Best-effort location of the current session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationFix {
    #[default]
    Locating,
    /// Position known; reverse geocoding in flight.
    Geocoding { coords: Coordinates },
    Located { coords: Coordinates, address: String },
    Unavailable { reason: String },
}

impl LocationFix {
    /// Position known but no network to look up the street address.
    #[must_use]
    pub fn offline(coords: Coordinates) -> Self {
        Self::Located {
            coords,
            address: ADDRESS_OFFLINE.to_string(),
        }
    }

    /// Lookup finished; a failed lookup falls back to the raw coordinates.
    #[must_use]
    pub fn geocoded(coords: Coordinates, lookup: Result<String, LocationError>) -> Self {
        let address = match lookup {
            Ok(address) => address,
            Err(LocationError::AddressNotFound) => ADDRESS_UNKNOWN.to_string(),
            Err(_) => format_coordinates(coords),
        };
        Self::Located { coords, address }
    }

    #[must_use]
    pub fn display_address(&self) -> String {
        match self {
            Self::Locating => ADDRESS_LOCATING.to_string(),
            Self::Geocoding { coords } => format_coordinates(*coords),
            Self::Located { address, .. } => address.clone(),
            Self::Unavailable { .. } => ADDRESS_UNKNOWN.to_string(),
        }
    }

    /// Location as written into the incident record. Unknown positions are
    /// recorded as `(0, 0)` with a placeholder address.
    #[must_use]
    pub fn snapshot(&self) -> LocationSnapshot {
        match self {
            Self::Locating | Self::Unavailable { .. } => LocationSnapshot {
                lat: 0.0,
                lng: 0.0,
                address: ADDRESS_UNKNOWN.to_string(),
            },
            Self::Geocoding { coords } => LocationSnapshot {
                lat: coords.lat,
                lng: coords.lng,
                address: format_coordinates(*coords),
            },
            Self::Located { coords, address } => LocationSnapshot {
                lat: coords.lat,
                lng: coords.lng,
                address: address.clone(),
            },
        }
    }
}

#[must_use]
pub fn format_coordinates(coords: Coordinates) -> String {
    format!("{:.4}, {:.4}", coords.lat, coords.lng)
}

/// Subset of the Nominatim reverse response we read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ReverseGeocodeResponse {
    pub fn into_address(self) -> Result<String, LocationError> {
        self.display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(LocationError::AddressNotFound)
    }
}

pub fn reverse_geocode_url(base: &str, coords: Coordinates) -> Result<Url, LocationError> {
    let mut url = Url::parse(base).map_err(|e| LocationError::Geocoding(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("format", "json")
        .append_pair("lat", &coords.lat.to_string())
        .append_pair("lon", &coords.lng.to_string());
    Ok(url)
}
