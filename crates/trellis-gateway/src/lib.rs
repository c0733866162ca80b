pub mod api;
pub mod error;
pub mod router;
pub mod schemas;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, SharedState};
