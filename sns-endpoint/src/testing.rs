//! Shared fixtures and test doubles.
//!
//! Fixture payloads are signed with the key behind `fixtures/signing_cert.pem`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::handler::MessageHandler;
use crate::payload::{Notification, Payload};
use crate::transport::{FetchError, Transport};
use crate::verify::{NotificationVerifier, VerifyError};

pub const SIGNING_CERT_URL: &str =
    "https://sns.us-west-2.amazonaws.com/SimpleNotificationService-0000000000000000000000.pem";
pub const TOPIC_ARN: &str = "arn:aws:sns:us-west-2:123456789012:MyTopic";

pub const SIGNING_CERT_PEM: &str = include_str!("../fixtures/signing_cert.pem");
pub const TWO_CERTS_PEM: &str = include_str!("../fixtures/two_certs.pem");
pub const EC_CERT_PEM: &str = include_str!("../fixtures/ec_cert.pem");

/// SignatureVersion 1, with Subject
pub const NOTIFICATION: &str = include_str!("../fixtures/notification.json");
/// SignatureVersion 1, no Subject
pub const NOTIFICATION_NO_SUBJECT: &str = include_str!("../fixtures/notification_no_subject.json");
/// SignatureVersion 2, with Subject
pub const NOTIFICATION_SHA256: &str = include_str!("../fixtures/notification_sha256.json");
pub const SUBSCRIPTION_CONFIRMATION: &str =
    include_str!("../fixtures/subscription_confirmation.json");
pub const UNSUBSCRIBE_CONFIRMATION: &str =
    include_str!("../fixtures/unsubscribe_confirmation.json");

// =============================================================================
// Transport
// =============================================================================

enum StubResponse {
    Body(String),
    Status(u16),
}

/// In-memory transport that records every URL requested.
///
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct StubTransport {
    routes: HashMap<String, StubResponse>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), StubResponse::Body(body.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), StubResponse::Status(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        // Url normalizes an empty path to "/"; match either spelling
        let key = url.as_str();
        self.calls.lock().push(key.to_string());

        let route = self
            .routes
            .get(key)
            .or_else(|| self.routes.get(key.trim_end_matches('/')));

        match route {
            Some(StubResponse::Body(body)) => Ok(body.clone()),
            Some(StubResponse::Status(status)) => Err(FetchError::Status {
                url: key.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: key.to_string(),
                status: 404,
            }),
        }
    }
}

// =============================================================================
// Verifier
// =============================================================================

/// Verifier returning a fixed verdict and counting calls.
pub struct StubVerifier {
    verdict: bool,
    calls: Mutex<usize>,
}

impl StubVerifier {
    pub fn new(verdict: bool) -> Self {
        Self {
            verdict,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl NotificationVerifier for StubVerifier {
    async fn verify(&self, _payload: &Payload) -> Result<bool, VerifyError> {
        *self.calls.lock() += 1;
        Ok(self.verdict)
    }
}

// =============================================================================
// Message Handler
// =============================================================================

/// Handler recording each invocation, optionally failing.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<(String, Notification)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingHandler {
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Notification)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle_message(
        &self,
        message: &str,
        notification: &Notification,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push((message.to_string(), notification.clone()));

        if let Some(reason) = self.failure.lock().clone() {
            anyhow::bail!(reason);
        }
        Ok(())
    }
}
