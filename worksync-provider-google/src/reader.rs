//! Reading back the remote events this system owns.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use worksync_core::SyncResult;

use crate::api::GoogleApi;
use crate::types::GoogleEvent;
use crate::APP_SOURCE;

/// Upper bound on one list page. The engine syncs per-user item sets that
/// are far below this, so pagination is not followed.
const PAGE_SIZE: &str = "2500";

/// How far around "now" the list query looks, matching the window the app
/// schedules items in.
const SYNC_WINDOW_DAYS: i64 = 90;

/// A remote event created by this system, keyed for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub remote_id: String,
    pub local_id: String,
    /// When this system last wrote the event; used to skip no-op updates.
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl TaggedEvent {
    /// Validate one listed event. Events without our marker or without a
    /// `localId` are not ours to manage and are dropped.
    fn from_event(event: GoogleEvent) -> Option<Self> {
        if event.id.is_empty() {
            return None;
        }

        let private = event.extended_properties?.private;
        if private.app_source.as_deref() != Some(APP_SOURCE) {
            return None;
        }
        let local_id = private.local_id?;

        let last_sync_time = private
            .last_sync_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        Some(TaggedEvent {
            remote_id: event.id,
            local_id,
            last_sync_time,
        })
    }
}

/// List the calendar's events tagged with our marker, keyed by `local_id`.
///
/// The marker filter is applied server-side and re-checked client-side.
/// Failures propagate to the caller, which decides whether to degrade.
pub async fn list_tagged_events(
    api: &GoogleApi,
    access_token: &str,
    calendar_id: &str,
) -> SyncResult<HashMap<String, TaggedEvent>> {
    let now = Utc::now();
    let query = [
        ("maxResults", PAGE_SIZE.to_string()),
        ("singleEvents", "true".to_string()),
        (
            "privateExtendedProperty",
            format!("appSource={APP_SOURCE}"),
        ),
        ("timeMin", (now - Duration::days(SYNC_WINDOW_DAYS)).to_rfc3339()),
        ("timeMax", (now + Duration::days(SYNC_WINDOW_DAYS)).to_rfc3339()),
    ];

    let page = api.list_events(access_token, calendar_id, &query).await?;

    let mut events = HashMap::new();
    for event in page.items {
        if let Some(tagged) = TaggedEvent::from_event(event) {
            events.insert(tagged.local_id.clone(), tagged);
        }
    }

    debug!(calendar_id, count = events.len(), "listed tagged remote events");
    Ok(events)
}
