//! Extension point invoked for verified notifications.

use async_trait::async_trait;
use tracing::info;

use crate::payload::Notification;

/// Application logic for a verified `Notification`.
///
/// Called once per accepted delivery with the raw `Message` body and the
/// fully typed notification. Returning an error turns the delivery into a
/// 500 so SNS redelivers it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(
        &self,
        message: &str,
        notification: &Notification,
    ) -> anyhow::Result<()>;
}

/// Handler that only logs each notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle_message(
        &self,
        message: &str,
        notification: &Notification,
    ) -> anyhow::Result<()> {
        info!(
            message_id = %notification.envelope.message_id,
            topic_arn = %notification.envelope.topic_arn,
            subject = ?notification.subject(),
            message_length = message.len(),
            payload_message = %message,
            "sns_notification_handled"
        );
        Ok(())
    }
}
