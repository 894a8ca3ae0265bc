// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! This module publishes JSON messages to topic exchanges. Each publish first declares
//! the target exchange, then sends the message with the topic as routing key and the
//! caller's OpenTelemetry context in the headers.

use crate::{
    channel::AmqpChannel,
    client::AmqpClient,
    errors::AmqpError,
    exchange::declare_exchange,
    message::{self, Message},
    otel,
};
use async_trait::async_trait;
use opentelemetry::Context;
use std::sync::Arc;
use tracing::debug;

/// Sends messages to exchanges.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `msg` to `exchange_name` with `topic` as routing key.
    async fn publish(&self, exchange_name: &str, topic: &str, msg: &Message)
        -> Result<(), AmqpError>;

    /// Closes the channel. Later publishes fail.
    async fn close_channel(&self) -> Result<(), AmqpError>;
}

/// Publisher owning one channel.
///
/// `publish` takes `&self` and may be called from several tasks at once: the lapin
/// channel serializes frames itself. Messages published concurrently have no defined
/// relative order.
pub struct RabbitMQPublisher {
    channel: Arc<dyn AmqpChannel>,
}

impl RabbitMQPublisher {
    /// Claims a new channel from `client`.
    pub async fn new(client: &dyn AmqpClient) -> Result<RabbitMQPublisher, AmqpError> {
        let channel = client.create_channel().await?;

        Ok(RabbitMQPublisher { channel })
    }
}

#[async_trait]
impl Publisher for RabbitMQPublisher {
    /// The exchange is declared on every call. Redeclaration is idempotent on the
    /// broker, so this only costs a round trip. The default exchange (empty name)
    /// cannot be declared and routes by queue name, so it is used as is.
    async fn publish(
        &self,
        exchange_name: &str,
        topic: &str,
        msg: &Message,
    ) -> Result<(), AmqpError> {
        if !exchange_name.is_empty() {
            declare_exchange(self.channel.as_ref(), exchange_name).await?;
        }

        let payload = message::encode(msg)?;
        let headers = otel::inject_context(&Context::current());

        self.channel
            .basic_publish(exchange_name, topic, &payload, headers)
            .await?;

        debug!("published message to {} with key {}", exchange_name, topic);
        Ok(())
    }

    async fn close_channel(&self) -> Result<(), AmqpError> {
        self.channel.close().await
    }
}
