pub mod session;

pub use session::{require_admin, session_token, CurrentUser};
