//! NATS reply publisher for prediction outcomes

use crate::error::PredictError;
use crate::types::request::{encode_reply, RouteResponse};
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes route outcomes to the requester's reply subject
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    /// Create a new reply producer
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a success or `{"Error": ...}` reply
    pub async fn reply(
        &self,
        reply_to: Subject,
        outcome: &Result<RouteResponse, PredictError>,
    ) -> Result<()> {
        let payload = encode_reply(outcome)?;
        let size = payload.len();

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(
            reply_to = %reply_to,
            bytes = size,
            ok = outcome.is_ok(),
            "Published reply"
        );

        Ok(())
    }
}
