//! SNS Endpoint - verified receiver for Amazon SNS HTTP(S) deliveries.
//!
//! This library validates push notifications from SNS and routes them:
//! - Parses the JSON body into a typed message
//! - Fetches and caches the signing certificate
//! - Verifies the RSA signature over the canonical string
//! - Confirms subscriptions, acknowledges unsubscribes, and hands
//!   notifications to a `MessageHandler`
//!
//! ## Architecture
//!
//! ```text
//! SNS → Web Server → SnsEndpoint → Payload
//!     → SignatureVerifier (CertificateCache) → route
//! ```

pub mod cert;
pub mod config;
pub mod confirm;
pub mod handler;
pub mod payload;
pub mod transport;
pub mod verify;
pub mod web;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cert::{CertificateCache, CertificateError, SigningCertificate};
pub use config::{Config, ConfigError, EndpointConfig};
pub use confirm::SubscriptionConfirmer;
pub use handler::{LoggingHandler, MessageHandler};
pub use payload::{Confirmation, MessageType, Notification, Payload, PayloadError};
pub use transport::{FetchError, HttpTransport, Transport};
pub use verify::{NotificationVerifier, SignatureVerifier, VerifyError};
pub use web::{AppState, EndpointError, EndpointResponse, SnsEndpoint};
