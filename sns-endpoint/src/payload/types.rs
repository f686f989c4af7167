//! Message types delivered by SNS over HTTP.
//!
//! SNS posts three kinds of JSON documents, discriminated by their `Type`
//! field:
//! - `Notification`: a message published to the topic
//! - `SubscriptionConfirmation`: sent once when the endpoint is subscribed
//! - `UnsubscribeConfirmation`: sent once when the subscription is removed
//!
//! Parsing happens in two passes. Serde maps the body onto string-typed wire
//! structs, then each field is validated into its typed form. Validation
//! failures name the offending field.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Errors produced while parsing an inbound payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body is not JSON, or does not match any message schema
    #[error("payload does not match any SNS message schema: {0}")]
    Json(#[from] serde_json::Error),

    /// A field is present but its value is not acceptable
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// `SignatureVersion` is neither "1" nor "2"
    #[error("unsupported signature version `{0}`")]
    UnsupportedSignatureVersion(String),

    /// `TopicArn` does not have the `arn:partition:sns:region:account:topic` shape
    #[error("malformed topic ARN `{0}`")]
    MalformedTopicArn(String),
}

impl PayloadError {
    /// Name of the wire field that failed validation, if known.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PayloadError::Json(_) => None,
            PayloadError::InvalidField { field, .. } => Some(field),
            PayloadError::UnsupportedSignatureVersion(_) => Some("SignatureVersion"),
            PayloadError::MalformedTopicArn(_) => Some("TopicArn"),
        }
    }

    fn invalid(field: &'static str, reason: impl fmt::Display) -> Self {
        PayloadError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Typed Payloads
// =============================================================================

/// Signature scheme announced by the `SignatureVersion` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVersion {
    /// RSA PKCS#1 v1.5 over SHA-1
    V1,
    /// RSA PKCS#1 v1.5 over SHA-256
    V2,
}

impl SignatureVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureVersion::V1 => "1",
            SignatureVersion::V2 => "2",
        }
    }
}

impl FromStr for SignatureVersion {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(SignatureVersion::V1),
            "2" => Ok(SignatureVersion::V2),
            other => Err(PayloadError::UnsupportedSignatureVersion(other.to_string())),
        }
    }
}

/// An HTTP(S) URL that remembers its exact wire spelling.
///
/// `Url` normalizes on parse (trailing slashes, percent-encoding), but the
/// signed string must carry the bytes SNS sent, so both forms are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireUrl {
    raw: String,
    url: Url,
}

impl WireUrl {
    fn parse(field: &'static str, raw: String) -> Result<Self, PayloadError> {
        let url = Url::parse(&raw).map_err(|e| PayloadError::invalid(field, e))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PayloadError::invalid(
                field,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }

        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(PayloadError::invalid(field, "missing host"));
        }

        Ok(Self { raw, url })
    }

    /// The URL exactly as it appeared on the wire.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

impl fmt::Display for WireUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A `MessageId` validated as a UUID but kept in the spelling SNS sent.
///
/// `Uuid` accepts uppercase, braced and `urn:uuid:` forms and prints them all
/// lowercase hyphenated, which would change the signed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId {
    raw: String,
    id: Uuid,
}

impl MessageId {
    fn parse(raw: String) -> Result<Self, PayloadError> {
        let id = Uuid::parse_str(&raw).map_err(|e| PayloadError::invalid("MessageId", e))?;
        Ok(Self { raw, id })
    }

    /// The id exactly as it appeared on the wire.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Fields shared by every SNS message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Unique per delivery attempt (redeliveries reuse it)
    pub message_id: MessageId,
    pub topic_arn: String,
    pub message: String,
    /// Kept verbatim; reformatting would break the signature
    pub timestamp: String,
    pub signature_version: SignatureVersion,
    /// Decoded signature bytes
    pub signature: Vec<u8>,
    pub signing_cert_url: WireUrl,
}

impl Envelope {
    /// Account id segment of the topic ARN.
    ///
    /// ARNs look like `arn:aws:sns:us-west-2:123456789012:MyTopic`.
    pub fn account_id(&self) -> Result<&str, PayloadError> {
        let segments: Vec<&str> = self.topic_arn.split(':').collect();

        match segments.as_slice() {
            ["arn", _, _, _, account, _, ..] if !account.is_empty() => Ok(*account),
            _ => Err(PayloadError::MalformedTopicArn(self.topic_arn.clone())),
        }
    }
}

/// A message published to the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub envelope: Envelope,
    pub subject: Option<String>,
    pub unsubscribe_url: WireUrl,
}

impl Notification {
    /// Subject when present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.is_empty())
    }
}

/// Body shared by `SubscriptionConfirmation` and `UnsubscribeConfirmation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub envelope: Envelope,
    pub token: String,
    pub subscribe_url: WireUrl,
}

/// Discriminant of an SNS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Notification,
    SubscriptionConfirmation,
    UnsubscribeConfirmation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Notification => "Notification",
            MessageType::SubscriptionConfirmation => "SubscriptionConfirmation",
            MessageType::UnsubscribeConfirmation => "UnsubscribeConfirmation",
        }
    }
}

impl FromStr for MessageType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Notification" => Ok(MessageType::Notification),
            "SubscriptionConfirmation" => Ok(MessageType::SubscriptionConfirmation),
            "UnsubscribeConfirmation" => Ok(MessageType::UnsubscribeConfirmation),
            other => Err(PayloadError::invalid(
                "Type",
                format!("unknown message type `{other}`"),
            )),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated SNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Notification(Notification),
    SubscriptionConfirmation(Confirmation),
    UnsubscribeConfirmation(Confirmation),
}

impl Payload {
    /// Parse and validate a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        let wire: WirePayload = serde_json::from_slice(body)?;
        Payload::try_from(wire)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Notification(_) => MessageType::Notification,
            Payload::SubscriptionConfirmation(_) => MessageType::SubscriptionConfirmation,
            Payload::UnsubscribeConfirmation(_) => MessageType::UnsubscribeConfirmation,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Payload::Notification(n) => &n.envelope,
            Payload::SubscriptionConfirmation(c) | Payload::UnsubscribeConfirmation(c) => {
                &c.envelope
            }
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "Type")]
enum WirePayload {
    Notification(WireNotification),
    SubscriptionConfirmation(WireConfirmation),
    UnsubscribeConfirmation(WireConfirmation),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireEnvelope {
    message_id: String,
    topic_arn: String,
    message: String,
    timestamp: String,
    signature_version: String,
    signature: String,
    #[serde(rename = "SigningCertURL")]
    signing_cert_url: String,
}

#[derive(Debug, Deserialize)]
struct WireNotification {
    #[serde(flatten)]
    envelope: WireEnvelope,
    #[serde(default, rename = "Subject")]
    subject: Option<String>,
    #[serde(rename = "UnsubscribeURL")]
    unsubscribe_url: String,
}

#[derive(Debug, Deserialize)]
struct WireConfirmation {
    #[serde(flatten)]
    envelope: WireEnvelope,
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "SubscribeURL")]
    subscribe_url: String,
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = PayloadError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let message_id = MessageId::parse(wire.message_id)?;

        if wire.timestamp.is_empty() {
            return Err(PayloadError::invalid("Timestamp", "must not be empty"));
        }

        let signature_version = wire.signature_version.parse()?;

        let signature = STANDARD
            .decode(wire.signature.as_bytes())
            .map_err(|e| PayloadError::invalid("Signature", e))?;

        let signing_cert_url = WireUrl::parse("SigningCertURL", wire.signing_cert_url)?;

        Ok(Envelope {
            message_id,
            topic_arn: wire.topic_arn,
            message: wire.message,
            timestamp: wire.timestamp,
            signature_version,
            signature,
            signing_cert_url,
        })
    }
}

impl TryFrom<WireConfirmation> for Confirmation {
    type Error = PayloadError;

    fn try_from(wire: WireConfirmation) -> Result<Self, Self::Error> {
        Ok(Confirmation {
            envelope: wire.envelope.try_into()?,
            token: wire.token,
            subscribe_url: WireUrl::parse("SubscribeURL", wire.subscribe_url)?,
        })
    }
}

impl TryFrom<WirePayload> for Payload {
    type Error = PayloadError;

    fn try_from(wire: WirePayload) -> Result<Self, Self::Error> {
        let payload = match wire {
            WirePayload::Notification(n) => Payload::Notification(Notification {
                envelope: n.envelope.try_into()?,
                subject: n.subject,
                unsubscribe_url: WireUrl::parse("UnsubscribeURL", n.unsubscribe_url)?,
            }),
            WirePayload::SubscriptionConfirmation(c) => {
                Payload::SubscriptionConfirmation(c.try_into()?)
            }
            WirePayload::UnsubscribeConfirmation(c) => {
                Payload::UnsubscribeConfirmation(c.try_into()?)
            }
        };

        Ok(payload)
    }
}
