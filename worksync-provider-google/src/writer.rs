//! Writing single events to the remote calendar.

use std::time::Duration;

use worksync_core::{SyncError, SyncResult};

use crate::api::GoogleApi;
use crate::retry::with_retry;
use crate::types::{EventPayload, GoogleEvent};

/// Attempts for event creation, total (first try included).
const CREATE_ATTEMPTS: usize = 3;

/// Default pause between creation attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Write access to one calendar with one access token, scoped to a single
/// sync pass.
pub struct EventWriter<'a> {
    api: &'a GoogleApi,
    access_token: &'a str,
    calendar_id: &'a str,
    retry_delay: Duration,
}

impl<'a> EventWriter<'a> {
    pub fn new(
        api: &'a GoogleApi,
        access_token: &'a str,
        calendar_id: &'a str,
        retry_delay: Duration,
    ) -> Self {
        Self {
            api,
            access_token,
            calendar_id,
            retry_delay,
        }
    }

    fn payload_local_id(payload: &EventPayload) -> String {
        payload
            .extended_properties
            .private
            .local_id
            .clone()
            .unwrap_or_else(|| payload.summary.clone())
    }

    /// Create a new event. Creation is the one write treated as transient;
    /// it is retried with a fixed delay before the failure is re-raised.
    pub async fn create(&self, payload: &EventPayload) -> SyncResult<GoogleEvent> {
        with_retry(CREATE_ATTEMPTS, self.retry_delay, || {
            self.api
                .insert_event(self.access_token, self.calendar_id, payload)
        })
        .await
        .map_err(|err| SyncError::RemoteWrite {
            local_id: Self::payload_local_id(payload),
            message: err.to_string(),
        })
    }

    /// Replace an existing event. Not retried; failures feed the caller's
    /// per-item failure counter.
    pub async fn update(&self, remote_id: &str, payload: &EventPayload) -> SyncResult<GoogleEvent> {
        self.api
            .update_event(self.access_token, self.calendar_id, remote_id, payload)
            .await
            .map_err(|err| SyncError::RemoteWrite {
                local_id: Self::payload_local_id(payload),
                message: err.to_string(),
            })
    }

    /// Remove an event. Already-gone events count as deleted.
    pub async fn delete(&self, remote_id: &str) -> SyncResult<()> {
        self.api
            .delete_event(self.access_token, self.calendar_id, remote_id)
            .await
            .map_err(|err| SyncError::RemoteDelete {
                remote_id: remote_id.to_string(),
                message: err.to_string(),
            })
    }
}
