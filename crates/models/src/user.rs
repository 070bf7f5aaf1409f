use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,

    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub timezone: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(
        length(min = 1, message = "This field cannot be blank"),
        email(message = "This field must be a valid email address")
    )]
    pub email: String,

    #[validate(length(min = 8, message = "This field must be at least 8 characters long"))]
    pub password: String,

    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            timezone: user.timezone,
            created_at: user.created_at,
        }
    }
}
