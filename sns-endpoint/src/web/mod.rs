//! Web server module for handling SNS deliveries.
//!
//! This module provides:
//! - The dispatch state machine that validates and routes each delivery
//! - Plain-text responses with fixed reason strings
//! - axum handlers and router
//!
//! ## Flow
//!
//! ```text
//! POST → SnsEndpoint::dispatch → (confirm subscription | ignore unsubscribe | MessageHandler)
//! ```

pub mod endpoint;
pub mod handlers;
pub mod response;

pub use endpoint::{EndpointError, SnsEndpoint, MESSAGE_TYPE_HEADER};
pub use handlers::{health, router, sns_webhook, AppState, HealthResponse};
pub use response::EndpointResponse;
