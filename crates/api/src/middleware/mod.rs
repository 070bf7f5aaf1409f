pub mod auth;
pub mod csrf;
pub mod flash;
pub mod headers;

pub use auth::{require_auth, resolve_session, Identity};
pub use csrf::{csrf_protect, CsrfToken};
pub use flash::{load_flash, Flash};
pub use headers::common_headers;
