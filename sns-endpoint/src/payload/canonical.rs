//! Canonical string construction.
//!
//! SNS signs a newline-delimited list of `name\nvalue\n` pairs. The set and
//! order of fields depends on the message kind:
//!
//! ```text
//! Notification (with Subject):  Message, MessageId, Subject, Timestamp, TopicArn, Type
//! Notification (no Subject):    Message, MessageId, Timestamp, TopicArn, Type
//! (Un)SubscribeConfirmation:    Message, MessageId, SubscribeURL, Timestamp, Token, TopicArn, Type
//! ```
//!
//! Reference: https://docs.aws.amazon.com/sns/latest/dg/sns-verify-signature-of-message.html

use super::types::{Confirmation, Notification, Payload};

impl Payload {
    /// Build the exact string the sender signed.
    pub fn canonical_string(&self) -> String {
        let kind = self.message_type().as_str();

        match self {
            Payload::Notification(n) => notification_string(n, kind),
            Payload::SubscriptionConfirmation(c) | Payload::UnsubscribeConfirmation(c) => {
                confirmation_string(c, kind)
            }
        }
    }
}

fn notification_string(n: &Notification, kind: &str) -> String {
    let envelope = &n.envelope;

    let mut out = String::with_capacity(envelope.message.len() + 256);
    push_field(&mut out, "Message", &envelope.message);
    push_field(&mut out, "MessageId", envelope.message_id.as_str());
    if let Some(subject) = n.subject() {
        push_field(&mut out, "Subject", subject);
    }
    push_field(&mut out, "Timestamp", &envelope.timestamp);
    push_field(&mut out, "TopicArn", &envelope.topic_arn);
    push_field(&mut out, "Type", kind);
    out
}

fn confirmation_string(c: &Confirmation, kind: &str) -> String {
    let envelope = &c.envelope;

    let mut out = String::with_capacity(envelope.message.len() + c.token.len() + 512);
    push_field(&mut out, "Message", &envelope.message);
    push_field(&mut out, "MessageId", envelope.message_id.as_str());
    push_field(&mut out, "SubscribeURL", c.subscribe_url.as_str());
    push_field(&mut out, "Timestamp", &envelope.timestamp);
    push_field(&mut out, "Token", &c.token);
    push_field(&mut out, "TopicArn", &envelope.topic_arn);
    push_field(&mut out, "Type", kind);
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push('\n');
    out.push_str(value);
    out.push('\n');
}
