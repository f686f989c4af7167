//! Subscription confirmation.
//!
//! A `SubscriptionConfirmation` carries a `SubscribeURL`; the subscription
//! only becomes active once that URL is fetched. The host is checked against
//! an allow-pattern first so a forged message cannot make the server GET an
//! arbitrary URL.

use std::sync::Arc;

use regex::Regex;
use tracing::{error, info, warn};

use crate::payload::Confirmation;
use crate::transport::{FetchError, Transport};
use crate::web::response::{self, EndpointResponse};

/// Confirms subscriptions whose `SubscribeURL` host matches `domain`.
pub struct SubscriptionConfirmer {
    transport: Arc<dyn Transport>,
    domain: Regex,
}

impl SubscriptionConfirmer {
    pub fn new(transport: Arc<dyn Transport>, domain: Regex) -> Self {
        Self { transport, domain }
    }

    /// Confirm the subscription by fetching its `SubscribeURL`.
    ///
    /// Returns 400 `Improper Subscription Domain` without any network call
    /// when the host does not match. A failed GET is returned as an error so
    /// the operator learns the subscription never activated.
    pub async fn confirm(
        &self,
        confirmation: &Confirmation,
    ) -> Result<EndpointResponse, FetchError> {
        let subscribe_url = &confirmation.subscribe_url;
        let host = subscribe_url.host();

        if !self.domain.is_match(host) {
            warn!(
                subscribe_url = %subscribe_url,
                host = %host,
                pattern = %self.domain,
                "sns_subscription_domain_invalid"
            );
            return Ok(EndpointResponse::bad_request(
                response::IMPROPER_SUBSCRIPTION_DOMAIN,
            ));
        }

        if let Err(e) = self.transport.get(subscribe_url.url()).await {
            error!(
                subscribe_url = %subscribe_url,
                topic_arn = %confirmation.envelope.topic_arn,
                error = %e,
                "sns_subscription_confirm_failed"
            );
            return Err(e);
        }

        info!(
            topic_arn = %confirmation.envelope.topic_arn,
            message_id = %confirmation.envelope.message_id,
            "sns_subscription_confirmed"
        );

        Ok(EndpointResponse::ok(response::OK))
    }
}
