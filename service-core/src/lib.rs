//! service-core: Shared infrastructure for TicketSwapper marketplace services.
pub mod auth;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod signature;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
