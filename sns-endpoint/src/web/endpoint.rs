//! SNS dispatch state machine.
//!
//! Each delivery walks the checks below in order and stops at the first
//! failure:
//!
//! ```text
//! method → topic allow-list → payload → certificate domain → signature
//!        → message type allow-list → route
//! ```
//!
//! Rejections caused by the request are 400 responses. Failures of the
//! endpoint's own dependencies (certificate download, confirmation GET,
//! message handler) are returned as `EndpointError`.

use std::sync::Arc;

use axum::{
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cert::CertificateCache;
use crate::config::{Config, ConfigError, EndpointConfig};
use crate::confirm::SubscriptionConfirmer;
use crate::handler::MessageHandler;
use crate::payload::{Confirmation, Payload};
use crate::transport::{FetchError, HttpTransport, Transport};
use crate::verify::{NotificationVerifier, SignatureVerifier, VerifyError};
use crate::web::response::{self, EndpointResponse};

/// Header SNS sets to the message type of each delivery.
pub const MESSAGE_TYPE_HEADER: &str = "x-amz-sns-message-type";

/// Failures of the endpoint's own dependencies.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("signature verification could not complete: {0}")]
    Verification(#[from] VerifyError),

    #[error("subscription confirmation failed: {0}")]
    Confirmation(#[source] FetchError),

    #[error("message handler failed: {0:#}")]
    Handler(#[source] anyhow::Error),
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        error!(error = %self, "sns_endpoint_error");

        let status = match self {
            EndpointError::Verification(_) | EndpointError::Confirmation(_) => {
                StatusCode::BAD_GATEWAY
            }
            EndpointError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// Validates and routes SNS deliveries.
pub struct SnsEndpoint {
    config: EndpointConfig,
    verifier: Arc<dyn NotificationVerifier>,
    confirmer: SubscriptionConfirmer,
    handler: Arc<dyn MessageHandler>,
}

impl SnsEndpoint {
    pub fn new(
        config: EndpointConfig,
        verifier: Arc<dyn NotificationVerifier>,
        confirmer: SubscriptionConfirmer,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            config,
            verifier,
            confirmer,
            handler,
        }
    }

    /// Wire the endpoint over a shared transport.
    pub fn with_transport(
        config: &Config,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, ConfigError> {
        let endpoint_config = config.endpoint_config()?;

        let certificates = Arc::new(CertificateCache::new(
            Arc::clone(&transport),
            config.cert_cache_capacity,
        ));
        let verifier = Arc::new(SignatureVerifier::new(certificates));
        let confirmer =
            SubscriptionConfirmer::new(transport, endpoint_config.subscribe_domain.clone());

        Ok(Self::new(endpoint_config, verifier, confirmer, handler))
    }

    /// Wire the endpoint with a reqwest transport using the configured timeout.
    pub fn from_config(
        config: &Config,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, ConfigError> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        Self::with_transport(config, transport, handler)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Handle one delivery.
    pub async fn dispatch(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<EndpointResponse, EndpointError> {
        if *method != Method::POST {
            warn!(method = %method, "sns_method_not_allowed");
            return Ok(EndpointResponse::method_not_allowed());
        }

        if let Some(rejection) = self.check_topic(headers) {
            return Ok(rejection);
        }

        let payload = match Payload::from_slice(body) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    error = %e,
                    field = ?e.field(),
                    body_length = body.len(),
                    "sns_payload_invalid"
                );
                return Ok(EndpointResponse::bad_request(response::INVALID_PAYLOAD));
            }
        };

        let message_type = payload.message_type();
        let envelope = payload.envelope();

        let header_type = headers
            .get(MESSAGE_TYPE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Some(header_type) = header_type {
            if header_type != message_type.as_str() {
                warn!(
                    header_type = %header_type,
                    message_type = %message_type,
                    "sns_message_type_header_mismatch"
                );
            }
        }

        info!(
            message_id = %envelope.message_id,
            message_type = %message_type,
            topic_arn = %envelope.topic_arn,
            "sns_message_received"
        );

        let cert_host = envelope.signing_cert_url.host();
        if !self.config.cert_domain.is_match(cert_host) {
            warn!(
                cert_url = %envelope.signing_cert_url,
                pattern = %self.config.cert_domain,
                "sns_certificate_location_invalid"
            );
            return Ok(EndpointResponse::bad_request(
                response::IMPROPER_CERTIFICATE_LOCATION,
            ));
        }

        if self.config.verify_signature && !self.verifier.verify(&payload).await? {
            warn!(
                message_id = %envelope.message_id,
                message_type = %message_type,
                "sns_signature_rejected"
            );
            return Ok(EndpointResponse::bad_request(response::IMPROPER_SIGNATURE));
        }

        if let Some(allowed) = &self.config.allowed_message_types {
            if !allowed.contains(&message_type) {
                warn!(
                    message_id = %envelope.message_id,
                    message_type = %message_type,
                    "sns_message_type_not_allowed"
                );
                return Ok(EndpointResponse::bad_request(response::INVALID_MESSAGE_TYPE));
            }
        }

        match &payload {
            Payload::SubscriptionConfirmation(confirmation) => {
                if !self.should_confirm_subscription(confirmation) {
                    return Ok(EndpointResponse::bad_request(response::SUBSCRIPTION_DENIED));
                }
                self.confirmer
                    .confirm(confirmation)
                    .await
                    .map_err(EndpointError::Confirmation)
            }
            Payload::UnsubscribeConfirmation(confirmation) => {
                // Acknowledge so SNS stops redelivering; nothing to undo here.
                info!(
                    message_id = %confirmation.envelope.message_id,
                    topic_arn = %confirmation.envelope.topic_arn,
                    "sns_unsubscribe_not_handled"
                );
                Ok(EndpointResponse::ok(response::UNSUBSCRIBE_NOT_HANDLED))
            }
            Payload::Notification(notification) => {
                self.handler
                    .handle_message(&notification.envelope.message, notification)
                    .await
                    .map_err(EndpointError::Handler)?;

                info!(
                    message_id = %notification.envelope.message_id,
                    topic_arn = %notification.envelope.topic_arn,
                    "sns_notification_delivered"
                );
                Ok(EndpointResponse::ok(response::OK))
            }
        }
    }

    fn check_topic(&self, headers: &HeaderMap) -> Option<EndpointResponse> {
        let allowlist = self.config.topic_allowlist.as_ref()?;

        let Some(topic) = headers.get(self.config.topic_header.as_str()) else {
            warn!(header = %self.config.topic_header, "sns_topic_header_missing");
            return Some(EndpointResponse::bad_request(response::NO_TOPIC_HEADER));
        };

        let topic = topic.to_str().unwrap_or_default();
        if !allowlist.iter().any(|allowed| allowed == topic) {
            warn!(topic_arn = %topic, "sns_topic_not_allowed");
            return Some(EndpointResponse::bad_request(response::BAD_TOPIC));
        }

        None
    }

    /// Account policy for subscription confirmations.
    ///
    /// Without an account restriction every subscription is confirmed.
    /// Otherwise the account segment of `TopicArn` must match it.
    fn should_confirm_subscription(&self, confirmation: &Confirmation) -> bool {
        let Some(expected) = self.config.account_restriction.as_deref() else {
            return true;
        };

        match confirmation.envelope.account_id() {
            Ok(account) if account == expected => true,
            Ok(account) => {
                warn!(
                    account = %account,
                    expected_account = %expected,
                    "sns_subscription_account_denied"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "sns_subscription_account_unknown");
                false
            }
        }
    }
}
