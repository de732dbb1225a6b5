//! Access token lifecycle.

use chrono::{Duration, Utc};
use tracing::info;
use worksync_core::{CalendarConnection, SyncError, SyncResult};

use crate::api::GoogleApi;
use crate::config::Credentials;

/// Return a connection whose access token is valid for immediate use.
///
/// Expired tokens are exchanged at the OAuth token endpoint; the refreshed
/// connection is *returned*, not persisted — persistence is the caller's
/// explicit step. A connection that cannot yield a usable token (no access
/// token, or expired with no refresh token) fails with
/// [`SyncError::MissingCredentials`], which callers surface as "reconnect
/// your calendar". Refresh failures are fatal to the whole pass: every
/// later call would be unauthenticated.
pub async fn ensure_valid_token(
    api: &GoogleApi,
    credentials: &Credentials,
    connection: &CalendarConnection,
) -> SyncResult<CalendarConnection> {
    let now = Utc::now();

    if connection.token_expired(now) {
        if connection.refresh_token.is_empty() {
            return Err(SyncError::MissingCredentials);
        }

        info!(user_id = connection.user_id, "access token expired; refreshing");
        let refreshed = api
            .refresh_access_token(credentials, &connection.refresh_token)
            .await?;

        let mut updated = connection.clone();
        updated.access_token = refreshed.access_token;
        updated.token_expires_at = Some(now + Duration::seconds(refreshed.expires_in));
        // Google usually omits the refresh token on refresh; keep the stored one.
        return Ok(updated);
    }

    if connection.access_token.is_empty() {
        return Err(SyncError::MissingCredentials);
    }

    Ok(connection.clone())
}
