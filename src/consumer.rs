// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Relay
//!
//! Consumer settings for a subscription and the relay task that turns broker
//! deliveries into decoded messages. Deliveries are auto-acknowledged, so a body that
//! does not decode is logged and lost; the relay keeps going with the next one.
//!
//! When the reading side of a subscription goes away the relay cancels its broker
//! consumer before taking another delivery, leaving the rest on the queue.

use crate::{
    channel::{AmqpChannel, DeliveryStream, RawMessage},
    errors::AmqpError,
    message::{self, Message},
    otel,
};
use futures_util::StreamExt;
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
};
use std::{borrow::Cow, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Consumer tag used by every subscription
pub const CONSUMER_TAG: &str = "hosepipe";

/// Parameters of a `basic.consume` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerDefinition {
    pub(crate) tag: String,
    pub(crate) auto_ack: bool,
    pub(crate) exclusive: bool,
    pub(crate) no_local: bool,
    pub(crate) no_wait: bool,
}

impl ConsumerDefinition {
    /// A consumer that acknowledges manually and shares the queue.
    pub fn new(tag: &str) -> ConsumerDefinition {
        ConsumerDefinition {
            tag: tag.to_owned(),
            auto_ack: false,
            exclusive: false,
            no_local: false,
            no_wait: false,
        }
    }

    /// The broker considers a message delivered as soon as it is sent.
    pub fn auto_ack(mut self) -> Self {
        self.auto_ack = true;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_auto_ack(&self) -> bool {
        self.auto_ack
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn is_no_local(&self) -> bool {
        self.no_local
    }

    pub fn is_no_wait(&self) -> bool {
        self.no_wait
    }
}

impl Default for ConsumerDefinition {
    fn default() -> Self {
        ConsumerDefinition::new(CONSUMER_TAG).auto_ack()
    }
}

/// Decodes one delivery inside a consumer span.
pub(crate) fn consume(tracer: &BoxedTracer, delivery: &RawMessage) -> Result<Message, AmqpError> {
    let (_ctx, mut span) = otel::new_span(&delivery.headers, tracer, &delivery.routing_key);

    debug!(
        "received: {} - exchange: {}",
        delivery.routing_key, delivery.exchange,
    );

    match message::decode(&delivery.data) {
        Ok(msg) => {
            span.set_status(Status::Ok);
            Ok(msg)
        }
        Err(err) => {
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("failure to decode payload"),
            });
            Err(err)
        }
    }
}

/// Forwards decoded deliveries to `stream` until `deliveries` ends.
///
/// The relay owns the only sender, so the receiving side closes once this returns.
/// If the receiving side is dropped first, the consumer registered as `tag` on
/// `channel` is cancelled and the relay returns without pulling further deliveries.
///
/// # Parameters
/// * `deliveries` - Deliveries of the consumer, in broker order
/// * `stream` - Sending half of the subscription
/// * `channel` - Channel the consumer was started on
/// * `tag` - Consumer tag to cancel
pub(crate) async fn relay(
    mut deliveries: DeliveryStream,
    stream: mpsc::Sender<Message>,
    channel: Arc<dyn AmqpChannel>,
    tag: String,
) {
    let tracer = global::tracer("amqp subscriber");

    loop {
        let result = tokio::select! {
            biased;
            _ = stream.closed() => {
                debug!("subscription dropped, cancelling consumer");
                cancel(channel.as_ref(), &tag).await;
                return;
            }
            next = deliveries.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        let delivery = match result {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(error = err.to_string(), "errors consume msg");
                continue;
            }
        };

        match consume(&tracer, &delivery) {
            Ok(msg) => {
                if stream.send(msg).await.is_err() {
                    warn!(
                        routing_key = delivery.routing_key.as_str(),
                        "subscription dropped while forwarding, message lost"
                    );
                    cancel(channel.as_ref(), &tag).await;
                    return;
                }
            }
            Err(err) => error!(
                error = err.to_string(),
                routing_key = delivery.routing_key.as_str(),
                "error in subscribe relay, dropping message"
            ),
        }
    }

    debug!("delivery stream closed, closing subscription");
}

async fn cancel(channel: &dyn AmqpChannel, tag: &str) {
    // failures are logged by the channel
    let _ = channel.basic_cancel(tag).await;
}
