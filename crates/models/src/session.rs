use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A server-side session record.
///
/// `token` is the SHA-256 hex digest of the raw token handed to the client;
/// the raw token itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,

    #[serde(skip_serializing)]
    pub token: String,

    pub ip_address: String,
    pub user_agent: String,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A session is live only while its expiry is in the future. The lookup
    /// queries enforce this server-side; this mirrors that check for
    /// records already in memory.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: i64,
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
}

/// Listing projection for the settings page. Never exposes the token hash.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// True for the session that made the request.
    pub current: bool,
}

impl SessionSummary {
    pub fn from_session(session: Session, current: bool) -> Self {
        Self {
            id: session.id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            expires_at: session.expires_at,
            created_at: session.created_at,
            updated_at: session.updated_at,
            current,
        }
    }
}
