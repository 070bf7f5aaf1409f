pub mod session;
pub mod user;

// Re-export commonly used types
pub use session::{NewSession, Session, SessionSummary};
pub use user::{NewUser, User, UserProfile};
