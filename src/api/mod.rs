//! HTTP API module.
//!
//! Boundary surface for login, logout, the shell channel upgrade, and the
//! resize/upload side channels.

mod error;
mod extract;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::ClientOrigin;
pub use routes::create_router;
pub use state::AppState;
