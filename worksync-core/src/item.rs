//! Local schedulable items.
//!
//! These are immutable projections handed to the engine by the surrounding
//! application (task/assignment persistence). The engine never mutates them;
//! it only derives calendar payloads and the join key to remote events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of local entity an item projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Assignment,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Assignment => "assignment",
        }
    }
}

/// Task priority, when the source entity carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A snapshot of one local task or assignment for the duration of a sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulableItem {
    pub kind: ItemKind,
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchedulableItem {
    /// The stable key joining this item to its remote event: `"<kind>-<id>"`.
    ///
    /// The kind prefix keeps task and assignment ids from colliding.
    pub fn local_id(&self) -> String {
        format!("{}-{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(kind: ItemKind, id: i64) -> SchedulableItem {
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        SchedulableItem {
            kind,
            id,
            title: "Draft outline".to_string(),
            priority: Some(Priority::High),
            status: Some("in_progress".to_string()),
            start_at: t,
            end_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn local_id_is_kind_prefixed() {
        assert_eq!(item(ItemKind::Task, 42).local_id(), "task-42");
        assert_eq!(item(ItemKind::Assignment, 42).local_id(), "assignment-42");
    }

    #[test]
    fn local_ids_never_collide_across_kinds() {
        assert_ne!(
            item(ItemKind::Task, 7).local_id(),
            item(ItemKind::Assignment, 7).local_id()
        );
    }

    #[test]
    fn item_deserializes_from_caller_json() {
        let json = r#"{
            "kind": "task",
            "id": 7,
            "title": "Draft outline",
            "priority": "medium",
            "startAt": "2024-01-10T00:00:00Z",
            "endAt": "2024-01-11T00:00:00Z",
            "updatedAt": "2024-01-09T12:00:00Z"
        }"#;

        let item: SchedulableItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, ItemKind::Task);
        assert_eq!(item.priority, Some(Priority::Medium));
        assert_eq!(item.status, None);
        assert_eq!(item.local_id(), "task-7");
    }
}
