//! Google Calendar wire types.
//!
//! Typed request/response shapes for the events and token endpoints. Every
//! field sourced from the remote side is optional; validation happens where
//! the values are consumed, not during deserialization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Start or end of an event: date-only for all-day events, date-time with an
/// explicit timezone otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDate {
    AllDay {
        date: NaiveDate,
    },
    Timed {
        #[serde(rename = "dateTime")]
        date_time: DateTime<Utc>,
        #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },
}

/// Private metadata attached to events we own.
///
/// Google stores these as opaque string pairs, so `lastSyncTime` travels as
/// an RFC 3339 string and is parsed back when read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedProperties {
    pub private: PrivateProperties,
}

/// Outbound event payload for `events.insert` / `events.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Deterministic event id, set on create so the single-item path can
    /// look events up directly. Absent on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub description: String,
    pub start: EventDate,
    pub end: EventDate,
    pub color_id: String,
    pub extended_properties: ExtendedProperties,
}

/// The slice of an event resource this engine cares about in responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub extended_properties: Option<ExtendedProperties>,
}

/// Response of `events.list`. Some error-adjacent responses omit `items`
/// entirely; treat that as an empty page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
}

/// Raw body of the OAuth token endpoint on success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Raw body of the OAuth token endpoint on failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A validated refresh result.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: i64,
}
