//! Core record types for sos-beacon.
//!
//! This module defines the contacts and profile kept on the device and the
//! records written to the append logs.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Placeholder used wherever a value could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Intensity recorded for alerts that were not triggered by motion.
pub const NO_INTENSITY: &str = "N/A";

/// An emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name.
    pub name: String,
    /// Phone number including the country code, e.g. `+919876543210`.
    pub phone: String,
}

impl Contact {
    /// Create a new contact.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// The contacts seeded on first run.
#[must_use]
pub fn default_contacts() -> Vec<Contact> {
    vec![
        Contact::new("Mom", "+919481425584"),
        Contact::new("Dad", "+918618147776"),
    ]
}

/// The single user profile of this device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    /// Name shown in alerts.
    pub name: String,
    /// Blood type, e.g. `O+`.
    pub blood_type: String,
    /// Allergies, conditions, medication.
    pub medical_info: String,
    /// Free-form note appended to alerts.
    pub emergency_note: String,
}

impl UserProfile {
    /// Check whether a name has been set.
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// The name to put in alerts.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.has_name() {
            &self.name
        } else {
            UNKNOWN
        }
    }
}

/// Where the device was when an alert was raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// A position fix in decimal degrees.
    Known {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// No fix could be obtained.
    Unknown,
}

impl Location {
    /// Check whether a fix is present.
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }
}

/// Formats as the `lat,lon` pair used in map links.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known {
                latitude,
                longitude,
            } => write!(f, "{latitude},{longitude}"),
            Self::Unknown => write!(f, "{UNKNOWN},{UNKNOWN}"),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Known {
                latitude,
                longitude,
            } => {
                map.serialize_entry("latitude", latitude)?;
                map.serialize_entry("longitude", longitude)?;
            }
            Self::Unknown => {
                map.serialize_entry("latitude", UNKNOWN)?;
                map.serialize_entry("longitude", UNKNOWN)?;
            }
        }
        map.end()
    }
}

/// What raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// The SOS button, after the countdown.
    #[serde(rename = "Manual")]
    Manual,
    /// The motion monitor.
    #[serde(rename = "Shake Detection")]
    Shake,
}

impl Trigger {
    /// Motion-triggered alerts carry an intensity, manual ones do not.
    #[must_use]
    pub fn from_intensity(intensity: Option<f64>) -> Self {
        if intensity.is_some() {
            Self::Shake
        } else {
            Self::Manual
        }
    }
}

/// One dispatched alert as written to the SOS log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosRecord {
    /// Profile name, or `Unknown`.
    pub user: String,
    /// When the alert was raised (ISO-8601).
    pub time: String,
    /// What raised the alert.
    pub triggered_by: Trigger,
    /// Device location at dispatch.
    pub location: Location,
    /// Profile at dispatch.
    pub user_profile: UserProfile,
    /// Shake magnitude with two decimals, or `N/A`.
    pub intensity: String,
    /// Number of contacts the alert was addressed to.
    pub contacts_notified: usize,
}

impl SosRecord {
    /// Build a record for an alert raised now.
    #[must_use]
    pub fn new(
        profile: &UserProfile,
        location: Location,
        intensity: Option<f64>,
        contacts_notified: usize,
    ) -> Self {
        Self {
            user: profile.display_name().to_string(),
            time: iso_timestamp(Utc::now()),
            triggered_by: Trigger::from_intensity(intensity),
            location,
            user_profile: profile.clone(),
            intensity: intensity.map_or_else(|| NO_INTENSITY.to_string(), format_reading),
            contacts_notified,
        }
    }
}

/// The three axes of one acceleration sample as logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceleration {
    /// X axis.
    pub x: String,
    /// Y axis.
    pub y: String,
    /// Z axis.
    pub z: String,
}

impl Default for Acceleration {
    fn default() -> Self {
        Self {
            x: "0".to_string(),
            y: "0".to_string(),
            z: "0".to_string(),
        }
    }
}

/// One motion sample above the noise floor as written to the shake log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Magnitude with two decimals.
    pub intensity: String,
    /// Raw axes with two decimals each.
    pub acceleration: Acceleration,
    /// When the sample was taken (ISO-8601).
    pub timestamp: String,
}

impl MotionSample {
    /// Build a sample from a raw reading and its magnitude.
    #[must_use]
    pub fn new(magnitude: f64, x: f64, y: f64, z: f64, at: DateTime<Utc>) -> Self {
        Self {
            intensity: format_reading(magnitude),
            acceleration: Acceleration {
                x: format_reading(x),
                y: format_reading(y),
                z: format_reading(z),
            },
            timestamp: iso_timestamp(at),
        }
    }
}

/// Format a sensor value the way it is logged and shown: two decimals.
#[must_use]
pub fn format_reading(value: f64) -> String {
    format!("{value:.2}")
}

/// UTC timestamp with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
#[must_use]
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
