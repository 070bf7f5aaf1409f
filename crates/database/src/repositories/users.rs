use crate::error::{DatabaseError, Result};
use beacon_models::{NewUser, User};
use sqlx::PgPool;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user. The password is hashed by the caller; the
    /// plaintext from `new_user` never reaches the database.
    pub async fn create(&self, new_user: &NewUser, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, timezone)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(&new_user.timezone)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Database, DatabaseConfig};

    async fn test_db() -> Database {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        db.migrate().await.expect("Failed to migrate");
        db
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "password123".to_string(),
            timezone: "UTC".to_string(),
        }
    }

    /// Reruns against the same database must not collide on the unique
    /// email index.
    fn unique_email(prefix: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{}-{}@example.com", prefix, nanos)
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn duplicate_email_is_typed() {
        let db = test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        let email = unique_email("users-dup");
        repo.create(&new_user(&email), "hash").await.unwrap();
        let err = repo
            .create(&new_user(&email.to_uppercase()), "hash")
            .await
            .unwrap_err();

        assert!(matches!(err, DatabaseError::DuplicateEmail));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn email_lookup_is_case_insensitive() {
        let db = test_db().await;
        let repo = UserRepository::new(db.pool().clone());

        let email = unique_email("users-case");
        let created = repo.create(&new_user(&email), "hash").await.unwrap();
        let found = repo.find_by_email(&email.to_uppercase()).await.unwrap();

        assert_eq!(found.id, created.id);
    }
}
