use crate::error::{DatabaseError, Result};
use beacon_models::{NewSession, Session};
use sqlx::PgPool;

pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new session. A token-hash collision surfaces as
    /// `DatabaseError::DuplicateToken` for the caller's retry policy.
    pub async fn insert(&self, new_session: &NewSession) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token, ip_address, user_agent, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_session.user_id)
        .bind(&new_session.token)
        .bind(&new_session.ip_address)
        .bind(&new_session.user_agent)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(session)
    }

    /// Find a live session by its hashed token. Expired sessions are never
    /// returned, even when the hash matches.
    pub async fn find_by_token(&self, token_hash: &str) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE token = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound)?;

        Ok(session)
    }

    /// Refresh the session's freshness marker. Concurrent touches race
    /// last-write-wins.
    pub async fn touch(&self, session: &Session) -> Result<()> {
        sqlx::query("UPDATE sessions SET updated_at = NOW() WHERE id = $1")
            .bind(session.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a session (logout).
    pub async fn delete(&self, session: &Session) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(&session.token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete one of the user's own sessions. Rows belonging to other
    /// users are invisible here and report `NotFound`.
    pub async fn delete_by_id(&self, user_id: i64, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }

        Ok(())
    }

    /// All sessions for a user, most recently used first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Remove expired sessions, returning the number deleted.
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Database, DatabaseConfig};
    use beacon_models::NewUser;
    use chrono::{Duration, Utc};

    async fn test_db() -> Database {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        db.migrate().await.expect("Failed to migrate");
        db
    }

    async fn create_user(db: &Database, prefix: &str) -> i64 {
        let repo = crate::repositories::users::UserRepository::new(db.pool().clone());
        let user = repo
            .create(
                &NewUser {
                    email: unique_email(prefix),
                    password: "password123".to_string(),
                    timezone: "UTC".to_string(),
                },
                "$2b$12$C6UzMDM.H6dfI/f/IKcEeO7la7DJh3iM2/zUkNBXTAV4JFqsCvLDe",
            )
            .await
            .expect("Failed to create user");
        user.id
    }

    /// Reruns against the same database must not collide on the unique
    /// email index.
    fn unique_email(prefix: &str) -> String {
        format!("{}-{}@example.com", prefix, nanos())
    }

    /// Unique token hashes for the same reason.
    fn unique_token(prefix: &str) -> String {
        format!("{}-{}", prefix, nanos())
    }

    fn nanos() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }

    fn new_session(user_id: i64, token: &str, expires_in: Duration) -> NewSession {
        NewSession {
            user_id,
            token: token.to_string(),
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn insert_and_find_round_trip() {
        let db = test_db().await;
        let user_id = create_user(&db, "sessions-find").await;
        let repo = SessionRepository::new(db.pool().clone());

        let token = unique_token("hash-find");
        let inserted = repo
            .insert(&new_session(user_id, &token, Duration::days(30)))
            .await
            .unwrap();
        assert!(inserted.id > 0);

        let found = repo.find_by_token(&token).await.unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn expired_sessions_are_never_found() {
        let db = test_db().await;
        let user_id = create_user(&db, "sessions-expired").await;
        let repo = SessionRepository::new(db.pool().clone());

        let token = unique_token("hash-expired");
        repo.insert(&new_session(user_id, &token, Duration::seconds(-60)))
            .await
            .unwrap();

        let err = repo.find_by_token(&token).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn duplicate_token_is_typed() {
        let db = test_db().await;
        let user_id = create_user(&db, "sessions-dup").await;
        let repo = SessionRepository::new(db.pool().clone());

        let token = unique_token("hash-dup");
        repo.insert(&new_session(user_id, &token, Duration::days(30)))
            .await
            .unwrap();
        let err = repo
            .insert(&new_session(user_id, &token, Duration::days(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, DatabaseError::DuplicateToken));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn sweep_deletes_only_expired_sessions() {
        let db = test_db().await;
        let user_id = create_user(&db, "sessions-sweep").await;
        let repo = SessionRepository::new(db.pool().clone());

        // Start from a clean slate so the count below is exact.
        repo.delete_expired().await.unwrap();

        for i in 0..3 {
            repo.insert(&new_session(
                user_id,
                &unique_token(&format!("sweep-expired-{}", i)),
                Duration::seconds(-60),
            ))
            .await
            .unwrap();
        }
        for i in 0..2 {
            repo.insert(&new_session(
                user_id,
                &unique_token(&format!("sweep-live-{}", i)),
                Duration::days(30),
            ))
            .await
            .unwrap();
        }

        let deleted = repo.delete_expired().await.unwrap();
        assert_eq!(deleted, 3);

        let remaining = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
