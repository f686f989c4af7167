//! Plain-text responses returned to SNS.
//!
//! SNS only looks at the status code; the bodies are fixed reason strings
//! so operators and tests can tell rejections apart.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub const OK: &str = "OK";
pub const UNSUBSCRIBE_NOT_HANDLED: &str = "UnsubscribeConfirmation Not Handled";
pub const NO_TOPIC_HEADER: &str = "No TopicArn Header";
pub const BAD_TOPIC: &str = "Bad Topic";
pub const INVALID_PAYLOAD: &str = "Invalid payload";
pub const IMPROPER_CERTIFICATE_LOCATION: &str = "Improper Certificate Location";
pub const IMPROPER_SIGNATURE: &str = "Improper Signature";
pub const IMPROPER_SUBSCRIPTION_DOMAIN: &str = "Improper Subscription Domain";
pub const SUBSCRIPTION_DENIED: &str = "Subscription Denied";
pub const INVALID_MESSAGE_TYPE: &str = "Invalid Notification Type";
pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";

/// Outcome of handling one SNS delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: StatusCode,
    pub body: &'static str,
}

impl EndpointResponse {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn bad_request(reason: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: reason,
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            body: METHOD_NOT_ALLOWED,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for EndpointResponse {
    fn into_response(self) -> Response {
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            return (self.status, [(header::ALLOW, "POST")], self.body).into_response();
        }
        (self.status, self.body).into_response()
    }
}
