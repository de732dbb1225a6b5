//! Raw REST client for the Google Calendar API and OAuth token endpoint.

use reqwest::StatusCode;
use tracing::debug;
use worksync_core::{SyncError, SyncResult};

use crate::config::Credentials;
use crate::types::{
    EventPayload, EventsPage, GoogleEvent, RefreshedToken, TokenErrorBody, TokenResponse,
};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// HTTP client scoped to one Calendar API deployment.
///
/// Endpoints are constructor parameters so tests can point the client at a
/// local mock server.
pub struct GoogleApi {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
}

impl Default for GoogleApi {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleApi {
    pub fn new() -> Self {
        Self::with_urls(DEFAULT_BASE_URL, DEFAULT_TOKEN_URL)
    }

    pub fn with_urls(base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token_url: token_url.into(),
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, calendar_id)
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!("{}/{}", self.events_url(calendar_id), event_id)
    }

    /// List events on the calendar. `query` carries the caller's filters
    /// (marker, window, page size).
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &[(&str, String)],
    ) -> SyncResult<EventsPage> {
        let response = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|err| SyncError::RemoteList(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteList(failure_message(response).await));
        }

        response
            .json::<EventsPage>()
            .await
            .map_err(|err| SyncError::RemoteList(err.to_string()))
    }

    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> SyncResult<GoogleEvent> {
        debug!(calendar_id, event_id = ?payload.id, "inserting event");
        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(SyncError::Transport(failure_message(response).await));
        }

        response.json::<GoogleEvent>().await.map_err(transport)
    }

    pub async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
    ) -> SyncResult<GoogleEvent> {
        debug!(calendar_id, event_id, "updating event");
        let response = self
            .http
            .put(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(SyncError::Transport(failure_message(response).await));
        }

        response.json::<GoogleEvent>().await.map_err(transport)
    }

    /// Fetch one event by id. A 404 means "not there", not an error.
    pub async fn get_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> SyncResult<Option<GoogleEvent>> {
        let response = self
            .http
            .get(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::Transport(failure_message(response).await));
        }

        response.json::<GoogleEvent>().await.map(Some).map_err(transport)
    }

    /// Delete one event. 404 and 410 count as success: the event is gone,
    /// which is what the caller wanted.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> SyncResult<()> {
        debug!(calendar_id, event_id, "deleting event");
        let response = self
            .http
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(()),
            _ => Err(SyncError::Transport(failure_message(response).await)),
        }
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_access_token(
        &self,
        credentials: &Credentials,
        refresh_token: &str,
    ) -> SyncResult<RefreshedToken> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| SyncError::TokenRefresh(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: TokenErrorBody = response.json().await.unwrap_or_default();
            let detail = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| status.to_string());
            return Err(SyncError::TokenRefresh(detail));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| SyncError::TokenRefresh(err.to_string()))?;

        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SyncError::TokenRefresh("token response missing access_token".to_string()))?;

        Ok(RefreshedToken {
            access_token,
            expires_in: body.expires_in.unwrap_or(3600),
        })
    }
}

fn transport(err: reqwest::Error) -> SyncError {
    SyncError::Transport(err.to_string())
}

async fn failure_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}
