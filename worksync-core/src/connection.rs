//! Per-user calendar connection state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

/// OAuth2 credentials and target calendar for one user's linked calendar.
///
/// Treated as an immutable value: token refresh produces a *new* connection,
/// and persisting it is an explicit step through [`ConnectionStore`] rather
/// than a hidden side effect of the refresh itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConnection {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    /// When the current access token expires. `None` means the provider
    /// never reported an expiry; the token is used as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Remote calendar to sync into (e.g. `"primary"`).
    pub calendar_id: String,
}

impl CalendarConnection {
    /// Whether the access token is past its expiry.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Persistence seam for calendar connections.
///
/// The engine reads connections from its callers and only writes back
/// through this trait when a token refresh produced new credentials.
pub trait ConnectionStore: Send + Sync {
    fn save(&self, connection: &CalendarConnection) -> SyncResult<()>;
    fn load(&self, user_id: i64) -> SyncResult<CalendarConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn connection(expires_at: Option<DateTime<Utc>>) -> CalendarConnection {
        CalendarConnection {
            user_id: 1,
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            token_expires_at: expires_at,
            calendar_id: "primary".to_string(),
        }
    }

    #[test]
    fn token_expired_compares_against_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();

        assert!(connection(Some(now - Duration::minutes(1))).token_expired(now));
        assert!(connection(Some(now)).token_expired(now));
        assert!(!connection(Some(now + Duration::minutes(1))).token_expired(now));
    }

    #[test]
    fn missing_expiry_never_counts_as_expired() {
        assert!(!connection(None).token_expired(Utc::now()));
    }
}
