// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Abstraction
//!
//! Publishers and subscribers talk to the broker through the `AmqpChannel` trait, one
//! instance per role. `LapinChannel` implements it on top of a `lapin` channel and
//! maps every broker failure into an `AmqpError` naming the exchange or queue involved.

use crate::{
    consumer::ConsumerDefinition,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    message::JSON_CONTENT_TYPE,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use lapin::{
    message::Delivery,
    options::{
        BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};
use std::collections::BTreeMap;
use tracing::{debug, error};
use uuid::Uuid;

/// AMQP reply code for a normal shutdown
pub const REPLY_SUCCESS: u16 = 200;

/// A delivery handed over by the broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMessage {
    pub exchange: String,
    pub routing_key: String,
    pub headers: BTreeMap<ShortString, AMQPValue>,
    pub data: Vec<u8>,
}

impl From<Delivery> for RawMessage {
    fn from(delivery: Delivery) -> Self {
        RawMessage {
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            headers: delivery
                .properties
                .headers()
                .clone()
                .unwrap_or_default()
                .inner()
                .clone(),
            data: delivery.data,
        }
    }
}

/// Deliveries of one consumer, in broker order. The stream ends when the broker
/// cancels the consumer or the channel closes.
pub type DeliveryStream = BoxStream<'static, Result<RawMessage, AmqpError>>;

/// A channel owned by exactly one publisher or subscriber.
///
/// Implementations must be safe to share across tasks; `LapinChannel` is, since lapin
/// serializes frames on the channel internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    async fn exchange_declare(&self, def: &ExchangeDefinition) -> Result<(), AmqpError>;

    async fn queue_declare(&self, def: &QueueDefinition) -> Result<(), AmqpError>;

    async fn queue_bind(&self, binding: &QueueBinding) -> Result<(), AmqpError>;

    /// Publishes `payload` without the mandatory or immediate flags.
    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        headers: BTreeMap<ShortString, AMQPValue>,
    ) -> Result<(), AmqpError>;

    async fn basic_consume(
        &self,
        queue: &str,
        def: &ConsumerDefinition,
    ) -> Result<DeliveryStream, AmqpError>;

    /// Stops the broker from delivering to the consumer registered under `tag`.
    async fn basic_cancel(&self, tag: &str) -> Result<(), AmqpError>;

    async fn close(&self) -> Result<(), AmqpError>;
}

/// `AmqpChannel` backed by a lapin channel.
pub struct LapinChannel {
    channel: Channel,
}

impl LapinChannel {
    pub fn new(channel: Channel) -> LapinChannel {
        LapinChannel { channel }
    }
}

#[async_trait]
impl AmqpChannel for LapinChannel {
    async fn exchange_declare(&self, def: &ExchangeDefinition) -> Result<(), AmqpError> {
        match self
            .channel
            .exchange_declare(
                &def.name,
                (&def.kind).into(),
                ExchangeDeclareOptions {
                    passive: def.passive,
                    durable: def.durable,
                    auto_delete: def.delete,
                    internal: def.internal,
                    nowait: def.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name.as_str(),
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(def.name.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn queue_declare(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        match self
            .channel
            .queue_declare(
                &def.name,
                QueueDeclareOptions {
                    passive: def.passive,
                    durable: def.durable,
                    exclusive: def.exclusive,
                    auto_delete: def.delete,
                    nowait: def.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name.as_str(),
                    "error to declare the queue"
                );
                Err(AmqpError::DeclareQueueError(def.name.clone()))
            }
            _ => {
                debug!("queue: {} was declared", def.name);
                Ok(())
            }
        }
    }

    async fn queue_bind(&self, binding: &QueueBinding) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            binding.queue_name, binding.exchange_name, binding.routing_key
        );

        match self
            .channel
            .queue_bind(
                &binding.queue_name,
                &binding.exchange_name,
                &binding.routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    binding.exchange_name.clone(),
                    binding.queue_name.clone(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        headers: BTreeMap<ShortString, AMQPValue>,
    ) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                payload,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(headers)),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError(exchange.to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn basic_consume(
        &self,
        queue: &str,
        def: &ConsumerDefinition,
    ) -> Result<DeliveryStream, AmqpError> {
        let consumer = match self
            .channel
            .basic_consume(
                queue,
                &def.tag,
                BasicConsumeOptions {
                    no_local: def.no_local,
                    no_ack: def.auto_ack,
                    exclusive: def.exclusive,
                    nowait: def.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::ConsumeStartError(queue.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        Ok(consumer
            .map(|result| {
                result
                    .map(RawMessage::from)
                    .map_err(|err| AmqpError::ConsumerError(err.to_string()))
            })
            .boxed())
    }

    async fn basic_cancel(&self, tag: &str) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_cancel(tag, BasicCancelOptions { nowait: false })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), tag, "error to cancel the consumer");
                Err(AmqpError::ConsumerError(tag.to_owned()))
            }
            _ => {
                debug!("consumer: {} was cancelled", tag);
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), AmqpError> {
        debug!("closing amqp channel...");

        match self.channel.close(REPLY_SUCCESS, "OK").await {
            Err(err) => {
                error!(error = err.to_string(), "error to close the channel");
                Err(AmqpError::CloseError("channel".to_owned()))
            }
            _ => {
                debug!("channel closed");
                Ok(())
            }
        }
    }
}
