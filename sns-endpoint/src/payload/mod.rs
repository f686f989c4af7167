//! SNS payload model.
//!
//! This module provides:
//! - Typed message variants parsed from the untrusted request body
//! - Field validation (UUIDs, URLs, base64 signatures, signature versions)
//! - The canonical string each message kind is signed over
//!
//! ## Parsing Flow
//!
//! ```text
//! request body → WirePayload (serde) → validation → Payload
//! ```

pub mod canonical;
pub mod types;

pub use types::{
    Confirmation, Envelope, MessageId, MessageType, Notification, Payload, PayloadError,
    SignatureVersion, WireUrl,
};
