use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session token collision persisted across retries")]
    TokenCollision,

    #[error("Cookie verification failed: {0}")]
    InvalidCookie(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] beacon_database::DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
