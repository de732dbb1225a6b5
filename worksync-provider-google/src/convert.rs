//! Conversion from local schedulable items to Google event payloads.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::warn;
use worksync_core::{ItemKind, Priority, SchedulableItem};

use crate::types::{EventDate, EventPayload, ExtendedProperties, PrivateProperties};
use crate::APP_SOURCE;

/// Build the remote payload for one item.
///
/// End dates that precede the start are clamped to the start (logged, not an
/// error — the source data contains these). An item is all-day when both
/// endpoints fall exactly at midnight in the configured timezone.
pub fn to_event_payload(item: &SchedulableItem, tz: Tz, now: DateTime<Utc>) -> EventPayload {
    let start = item.start_at.with_timezone(&tz);
    let mut end = item.end_at.with_timezone(&tz);

    if end < start {
        warn!(
            local_id = %item.local_id(),
            start = %start,
            end = %end,
            "end date precedes start date; clamping end to start"
        );
        end = start;
    }

    let all_day = start.time() == NaiveTime::MIN && end.time() == NaiveTime::MIN;
    let (start_field, end_field) = if all_day {
        (
            EventDate::AllDay {
                date: start.date_naive(),
            },
            EventDate::AllDay {
                date: end.date_naive(),
            },
        )
    } else {
        (
            EventDate::Timed {
                date_time: start.with_timezone(&Utc),
                time_zone: Some(tz.name().to_string()),
            },
            EventDate::Timed {
                date_time: end.with_timezone(&Utc),
                time_zone: Some(tz.name().to_string()),
            },
        )
    };

    EventPayload {
        id: None,
        summary: item.title.clone(),
        description: description_for(item, end.date_naive()),
        start: start_field,
        end: end_field,
        color_id: color_id_for(item.priority).to_string(),
        extended_properties: ExtendedProperties {
            private: PrivateProperties {
                local_id: Some(item.local_id()),
                app_source: Some(APP_SOURCE.to_string()),
                last_sync_time: Some(now.to_rfc3339()),
            },
        },
    }
}

fn description_for(item: &SchedulableItem, due: chrono::NaiveDate) -> String {
    let status = item.status.as_deref().unwrap_or("unspecified");
    match item.kind {
        ItemKind::Task => {
            let priority = item.priority.map(|p| p.as_str()).unwrap_or("unspecified");
            format!(
                "Task: {}\nPriority: {}\nStatus: {}",
                item.title, priority, status
            )
        }
        ItemKind::Assignment => {
            format!("Assignment: {}\nDue: {}\nStatus: {}", item.title, due, status)
        }
    }
}

/// Deterministic color per priority. The palette matches the app's existing
/// calendar colors; only the determinism is contractual.
fn color_id_for(priority: Option<Priority>) -> &'static str {
    match priority {
        Some(Priority::High) => "11",
        Some(Priority::Medium) => "6",
        Some(Priority::Low) => "10",
        None => "8",
    }
}
