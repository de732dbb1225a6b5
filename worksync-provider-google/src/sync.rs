//! Reconciliation between local items and the remote calendar.
//!
//! One full pass: refresh credentials, read the tagged remote events once,
//! diff against the item set by `local_id`, push creates/updates, then prune
//! remote events whose local item is gone. A lightweight single-item path
//! pushes one item without the read-all/prune phases.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use worksync_core::{CalendarConnection, ConnectionStore, SchedulableItem, SyncResult, SyncStats};

use crate::api::GoogleApi;
use crate::config::{Config, Credentials};
use crate::convert::to_event_payload;
use crate::reader;
use crate::token;
use crate::writer::{EventWriter, DEFAULT_RETRY_DELAY};

pub struct SyncEngine<S> {
    api: GoogleApi,
    credentials: Credentials,
    timezone: Tz,
    retry_delay: Duration,
    store: S,
    /// Per-user guards: an overlapping full pass and single-item push for
    /// the same connection must not race on token refresh or double-create.
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl<S: ConnectionStore> SyncEngine<S> {
    pub fn new(api: GoogleApi, credentials: Credentials, timezone: Tz, store: S) -> Self {
        Self {
            api,
            credentials,
            timezone,
            retry_delay: DEFAULT_RETRY_DELAY,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config, store: S) -> SyncResult<Self> {
        let timezone = config.tz()?;
        Ok(
            Self::new(GoogleApi::new(), config.credentials.clone(), timezone, store)
                .with_retry_delay(config.retry_delay()),
        )
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    /// Ensure usable credentials, persisting them if the token was refreshed.
    async fn authorized(&self, connection: &CalendarConnection) -> SyncResult<CalendarConnection> {
        let valid = token::ensure_valid_token(&self.api, &self.credentials, connection).await?;
        if valid.access_token != connection.access_token {
            self.store.save(&valid)?;
            info!(user_id = valid.user_id, "persisted refreshed credentials");
        }
        Ok(valid)
    }

    /// Run one full reconciliation pass over `items`.
    ///
    /// Only credential failures abort the pass; everything else is absorbed
    /// into the returned [`SyncStats`].
    pub async fn sync(
        &self,
        connection: &CalendarConnection,
        items: &[SchedulableItem],
    ) -> SyncResult<SyncStats> {
        let lock = self.user_lock(connection.user_id).await;
        let _guard = lock.lock().await;

        let connection = self.authorized(connection).await?;
        let access_token = connection.access_token.as_str();

        // A failed list degrades to "remote is empty" rather than aborting:
        // the items still get pushed, at the risk of duplicating events the
        // next pass cannot prune. Accepted trade-off; see DESIGN.md.
        let existing =
            match reader::list_tagged_events(&self.api, access_token, &connection.calendar_id).await
            {
                Ok(events) => events,
                Err(err) => {
                    warn!(
                        user_id = connection.user_id,
                        error = %err,
                        "listing remote events failed; continuing with empty remote state"
                    );
                    HashMap::new()
                }
            };

        let writer = EventWriter::new(
            &self.api,
            access_token,
            &connection.calendar_id,
            self.retry_delay,
        );

        let mut stats = SyncStats {
            total: items.len(),
            ..SyncStats::default()
        };
        let mut current_ids = HashSet::with_capacity(items.len());

        for item in items {
            let local_id = item.local_id();
            current_ids.insert(local_id.clone());

            let remote = existing.get(&local_id);
            if let Some(remote) = remote {
                let current = remote
                    .last_sync_time
                    .is_some_and(|synced| synced >= item.updated_at);
                if current {
                    stats.skipped += 1;
                    continue;
                }
            }

            let mut payload = to_event_payload(item, self.timezone, Utc::now());
            let outcome = match remote {
                Some(remote) => writer.update(&remote.remote_id, &payload).await,
                None => {
                    payload.id = Some(local_id.clone());
                    writer.create(&payload).await
                }
            };

            match outcome {
                Ok(_) => stats.success += 1,
                Err(err) => {
                    error!(
                        user_id = connection.user_id,
                        local_id = %local_id,
                        error = %err,
                        "failed to push item"
                    );
                    stats.failed += 1;
                }
            }
        }

        // Prune events whose local item no longer exists.
        for (local_id, remote) in &existing {
            if current_ids.contains(local_id) {
                continue;
            }
            match writer.delete(&remote.remote_id).await {
                Ok(()) => {
                    info!(
                        user_id = connection.user_id,
                        local_id = %local_id,
                        "deleted orphaned remote event"
                    );
                    stats.deleted += 1;
                }
                Err(err) => {
                    error!(
                        user_id = connection.user_id,
                        local_id = %local_id,
                        error = %err,
                        "failed to delete orphaned remote event"
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(user_id = connection.user_id, %stats, "sync pass complete");
        Ok(stats)
    }

    /// Push a single item immediately, without a deletion pass.
    ///
    /// The remote event is addressed by its deterministic id (the item's
    /// `local_id`), so no full listing is needed. Unconditional push: no
    /// skip accounting.
    pub async fn sync_one(
        &self,
        connection: &CalendarConnection,
        item: &SchedulableItem,
    ) -> SyncResult<()> {
        let lock = self.user_lock(connection.user_id).await;
        let _guard = lock.lock().await;

        let connection = self.authorized(connection).await?;
        let access_token = connection.access_token.as_str();
        let local_id = item.local_id();

        let writer = EventWriter::new(
            &self.api,
            access_token,
            &connection.calendar_id,
            self.retry_delay,
        );
        let mut payload = to_event_payload(item, self.timezone, Utc::now());

        match self
            .api
            .get_event(access_token, &connection.calendar_id, &local_id)
            .await?
        {
            Some(existing) => {
                writer.update(&existing.id, &payload).await?;
            }
            None => {
                payload.id = Some(local_id);
                writer.create(&payload).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use mockito::Matcher;
    use worksync_core::{ItemKind, Priority, SyncError};

    /// In-memory store capturing what the engine persists.
    #[derive(Default)]
    struct MemoryStore(std::sync::Mutex<Option<CalendarConnection>>);

    impl ConnectionStore for MemoryStore {
        fn save(&self, connection: &CalendarConnection) -> SyncResult<()> {
            *self.0.lock().unwrap() = Some(connection.clone());
            Ok(())
        }

        fn load(&self, _user_id: i64) -> SyncResult<CalendarConnection> {
            self.0
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SyncError::Store("empty".to_string()))
        }
    }

    fn engine_for(server: &mockito::Server) -> SyncEngine<MemoryStore> {
        let api = GoogleApi::with_urls(server.url(), format!("{}/token", server.url()));
        let credentials = Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        SyncEngine::new(api, credentials, Tz::UTC, MemoryStore::default())
            .with_retry_delay(Duration::ZERO)
    }

    fn connection() -> CalendarConnection {
        CalendarConnection {
            user_id: 1,
            access_token: "tok".to_string(),
            refresh_token: "refresh".to_string(),
            token_expires_at: None,
            calendar_id: "primary".to_string(),
        }
    }

    fn task(id: i64, start: &str, end: &str, updated: &str) -> SchedulableItem {
        SchedulableItem {
            kind: ItemKind::Task,
            id,
            title: "Draft outline".to_string(),
            priority: Some(Priority::Medium),
            status: Some("todo".to_string()),
            start_at: ts(start),
            end_at: ts(end),
            updated_at: ts(updated),
        }
    }

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn empty_list_mock(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await
    }

    async fn list_mock_with(server: &mut mockito::Server, items_json: &str) -> mockito::Mock {
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"items":{items_json}}}"#))
            .create_async()
            .await
    }

    fn tagged_item_json(remote_id: &str, local_id: &str, last_sync: &str) -> String {
        format!(
            r#"{{"id":"{remote_id}",
                 "extendedProperties":{{"private":{{
                     "localId":"{local_id}",
                     "appSource":"worksync",
                     "lastSyncTime":"{last_sync}"}}}}}}"#
        )
    }

    #[tokio::test]
    async fn creates_event_with_clamped_all_day_dates() {
        // The concrete scenario: end precedes start, both at midnight, empty
        // remote state. One create with end clamped to start, all-day fields.
        let mut server = mockito::Server::new_async().await;
        empty_list_mock(&mut server).await;
        let create = server
            .mock("POST", "/calendars/primary/events")
            .match_body(Matcher::PartialJsonString(
                r#"{"id":"task-7","start":{"date":"2024-01-10"},"end":{"date":"2024-01-10"}}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let items = vec![task(
            7,
            "2024-01-10T00:00:00Z",
            "2024-01-09T00:00:00Z",
            "2024-01-08T00:00:00Z",
        )];
        let stats = engine.sync(&connection(), &items).await.unwrap();

        assert_eq!(
            stats,
            SyncStats {
                success: 1,
                skipped: 0,
                deleted: 0,
                failed: 0,
                total: 1
            }
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn unchanged_items_are_skipped() {
        // Remote copy is newer than the item: idempotent second pass.
        let mut server = mockito::Server::new_async().await;
        list_mock_with(
            &mut server,
            &format!("[{}]", tagged_item_json("evt-7", "task-7", "2024-01-09T00:00:00Z")),
        ).await;
        let write = server
            .mock("POST", "/calendars/primary/events")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let items = vec![task(
            7,
            "2024-01-10T00:00:00Z",
            "2024-01-11T00:00:00Z",
            "2024-01-08T00:00:00Z",
        )];
        let stats = engine.sync(&connection(), &items).await.unwrap();

        assert_eq!(
            stats,
            SyncStats {
                success: 0,
                skipped: 1,
                deleted: 0,
                failed: 0,
                total: 1
            }
        );
        write.assert_async().await;
    }

    #[tokio::test]
    async fn stale_remote_events_are_updated_in_place() {
        let mut server = mockito::Server::new_async().await;
        list_mock_with(
            &mut server,
            &format!("[{}]", tagged_item_json("evt-7", "task-7", "2024-01-07T00:00:00Z")),
        ).await;
        let update = server
            .mock("PUT", "/calendars/primary/events/evt-7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"evt-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let items = vec![task(
            7,
            "2024-01-10T00:00:00Z",
            "2024-01-11T00:00:00Z",
            "2024-01-08T00:00:00Z",
        )];
        let stats = engine.sync(&connection(), &items).await.unwrap();

        assert_eq!(stats.success, 1);
        assert_eq!(stats.skipped, 0);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn orphaned_remote_events_are_deleted() {
        let mut server = mockito::Server::new_async().await;
        list_mock_with(
            &mut server,
            &format!("[{}]", tagged_item_json("evt-9", "task-9", "2024-01-07T00:00:00Z")),
        ).await;
        let delete = server
            .mock("DELETE", "/calendars/primary/events/evt-9")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let stats = engine.sync(&connection(), &[]).await.unwrap();

        assert_eq!(
            stats,
            SyncStats {
                success: 0,
                skipped: 0,
                deleted: 1,
                failed: 0,
                total: 0
            }
        );
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn one_failing_item_does_not_block_the_rest() {
        let mut server = mockito::Server::new_async().await;
        empty_list_mock(&mut server).await;
        let failing = server
            .mock("POST", "/calendars/primary/events")
            .match_body(Matcher::PartialJsonString(r#"{"id":"task-1"}"#.to_string()))
            .with_status(503)
            .expect(3)
            .create_async()
            .await;
        let succeeding = server
            .mock("POST", "/calendars/primary/events")
            .match_body(Matcher::PartialJsonString(r#"{"id":"task-2"}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-2"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let items = vec![
            task(1, "2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z", "2024-01-08T00:00:00Z"),
            task(2, "2024-01-11T09:00:00Z", "2024-01-11T10:00:00Z", "2024-01-08T00:00:00Z"),
        ];
        let stats = engine.sync(&connection(), &items).await.unwrap();

        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 2);
        failing.assert_async().await;
        succeeding.assert_async().await;
    }

    #[tokio::test]
    async fn list_failure_degrades_to_empty_remote_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;
        let create = server
            .mock("POST", "/calendars/primary/events")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let items = vec![task(
            7,
            "2024-01-10T09:00:00Z",
            "2024-01-10T10:00:00Z",
            "2024-01-08T00:00:00Z",
        )];
        let stats = engine.sync(&connection(), &items).await.unwrap();

        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 0);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_used_and_persisted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh","expires_in":3600}"#)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let mut conn = connection();
        conn.access_token = "stale".to_string();
        conn.token_expires_at = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        let stats = engine.sync(&conn, &[]).await.unwrap();
        assert_eq!(stats, SyncStats { total: 0, ..SyncStats::default() });

        let persisted = engine.store.load(1).unwrap();
        assert_eq!(persisted.access_token, "fresh");
        list.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_failure_aborts_the_pass() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Token has been expired"}"#)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let mut conn = connection();
        conn.token_expires_at = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        let err = engine.sync(&conn, &[]).await.unwrap_err();
        match err {
            SyncError::TokenRefresh(detail) => assert_eq!(detail, "Token has been expired"),
            other => panic!("expected TokenRefresh, got {other:?}"),
        }
        list.assert_async().await;
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_any_remote_call() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let mut conn = connection();
        conn.access_token = String::new();

        let err = engine.sync(&conn, &[]).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingCredentials));
        list.assert_async().await;
    }

    #[tokio::test]
    async fn sync_one_creates_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events/task-7")
            .with_status(404)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/calendars/primary/events")
            .match_body(Matcher::PartialJsonString(r#"{"id":"task-7"}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let item = task(7, "2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z", "2024-01-08T00:00:00Z");
        engine.sync_one(&connection(), &item).await.unwrap();

        create.assert_async().await;
    }

    #[tokio::test]
    async fn sync_one_updates_when_present() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events/task-7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-7"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/calendars/primary/events/task-7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"task-7"}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let item = task(7, "2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z", "2024-01-08T00:00:00Z");
        engine.sync_one(&connection(), &item).await.unwrap();

        update.assert_async().await;
    }
}
