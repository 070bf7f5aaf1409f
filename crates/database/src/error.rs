use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Record not found")]
    NotFound,

    #[error("Duplicate session token")]
    DuplicateToken,

    #[error("Duplicate email address")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

/// Unique indexes whose violations callers recover from locally.
const SESSION_TOKEN_CONSTRAINT: &str = "idx_session_token_unique";
const USER_EMAIL_CONSTRAINT: &str = "idx_users_email_unique";

impl DatabaseError {
    /// Translate known unique-constraint violations into their typed
    /// variants so call sites can match on them instead of sniffing
    /// driver error strings.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some(SESSION_TOKEN_CONSTRAINT) => return DatabaseError::DuplicateToken,
                    Some(USER_EMAIL_CONSTRAINT) => return DatabaseError::DuplicateEmail,
                    _ => {}
                }
            }
        }

        DatabaseError::Sqlx(err)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound)
    }
}
