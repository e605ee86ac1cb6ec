// OpenEngram server: HTTP surface over engram-core.

pub mod commands;
pub mod server;
pub mod state;

pub use server::{build_router, serve, ServerError};
pub use state::EngramState;
