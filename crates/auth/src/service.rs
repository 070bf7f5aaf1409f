use crate::error::{AuthError, Result};
use crate::{password, token};
use beacon_database::{Database, DatabaseError, SessionRepository, UserRepository};
use beacon_models::{NewSession, NewUser, Session, User};
use chrono::{Duration, Utc};
use validator::Validate;

/// Sessions live for 30 days from issuance.
pub const SESSION_LIFETIME_DAYS: i64 = 30;

/// Token-hash collisions are negligibly likely; a bounded retry keeps the
/// contract honest without risking an unbounded loop against a store that
/// is actually broken.
const MAX_TOKEN_ATTEMPTS: u32 = 3;

/// Request-side facts captured on the session record at creation.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub ip_address: String,
    pub user_agent: String,
}

pub struct AuthService {
    user_repo: UserRepository,
    session_repo: SessionRepository,
}

impl AuthService {
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();

        Self {
            user_repo: UserRepository::new(pool.clone()),
            session_repo: SessionRepository::new(pool),
        }
    }

    /// Register a new user. The plaintext password is hashed here and
    /// dropped; only the hash travels further.
    pub async fn signup(&self, new_user: &NewUser) -> Result<User> {
        new_user.validate()?;

        let password_hash = password::hash(&new_user.password)?;
        let user = self.user_repo.create(new_user, &password_hash).await?;

        Ok(user)
    }

    /// Authenticate by email and password.
    ///
    /// Unknown email and wrong password both collapse into
    /// `InvalidCredentials`; callers must not be able to tell them apart.
    pub async fn login(&self, email: &str, plaintext_password: &str) -> Result<User> {
        let user = match self.user_repo.find_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !password::verify(plaintext_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue a session for a user: generate a raw token, persist its hash
    /// with the request context and a 30-day expiry, and return the record
    /// together with the raw token for the cookie. The raw token exists
    /// only in the return value.
    pub async fn create_session(
        &self,
        user_id: i64,
        ctx: &SessionContext,
    ) -> Result<(Session, String)> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let raw_token = token::generate();

            let new_session = NewSession {
                user_id,
                token: token::hash(&raw_token),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                expires_at: Utc::now() + Duration::days(SESSION_LIFETIME_DAYS),
            };

            match self.session_repo.insert(&new_session).await {
                Ok(session) => return Ok((session, raw_token)),
                Err(DatabaseError::DuplicateToken) => {
                    tracing::warn!(attempt, "Session token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::TokenCollision)
    }

    /// Resolve a raw token from a cookie into a live session and its
    /// owning user. An unknown or expired token is `None` (anonymous);
    /// anything else is a store failure.
    pub async fn resolve_session(&self, raw_token: &str) -> Result<Option<(Session, User)>> {
        let hashed = token::hash(raw_token);

        let session = match self.session_repo.find_by_token(&hashed).await {
            Ok(session) => session,
            Err(DatabaseError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let user = self.user_repo.find_by_id(session.user_id).await?;
        Ok(Some((session, user)))
    }

    /// Refresh the session's `updated_at` freshness marker.
    pub async fn touch_session(&self, session: &Session) -> Result<()> {
        self.session_repo.touch(session).await?;
        Ok(())
    }

    /// Retire the session record (logout).
    pub async fn delete_session(&self, session: &Session) -> Result<()> {
        self.session_repo.delete(session).await?;
        Ok(())
    }

    /// Delete one of the user's own sessions by id.
    pub async fn delete_session_by_id(&self, user: &User, id: i64) -> Result<()> {
        self.session_repo.delete_by_id(user.id, id).await?;
        Ok(())
    }

    /// All sessions belonging to the user, most recently used first.
    pub async fn list_sessions(&self, user: &User) -> Result<Vec<Session>> {
        let sessions = self.session_repo.list_for_user(user.id).await?;
        Ok(sessions)
    }

    /// Sweep expired sessions, returning the number deleted. Failures
    /// propagate; the sweep worker decides how to report them.
    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        let count = self.session_repo.delete_expired().await?;
        Ok(count)
    }
}
