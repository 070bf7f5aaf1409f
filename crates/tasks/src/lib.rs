pub mod shutdown;
pub mod supervisor;

pub use shutdown::{ShutdownCoordinator, ShutdownError, ShutdownState};
pub use supervisor::Supervisor;
