// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Subscriber
//!
//! A subscription declares a durable queue, binds it to a topic exchange and consumes
//! it with auto-acknowledgment. Deliveries are decoded on a background task and handed
//! out through a `Subscription`, which ends when the broker closes the delivery stream.

use crate::{
    channel::AmqpChannel,
    client::AmqpClient,
    consumer::{relay, ConsumerDefinition},
    errors::AmqpError,
    exchange::declare_exchange,
    message::Message,
    policy::FailurePolicy,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use futures_util::Stream;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

/// Capacity of the stream between the relay task and the subscription
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 32;

/// Receives messages from queues.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Starts consuming `queue_name`, bound to `exchange_name` with `topic`.
    async fn subscribe(
        &self,
        exchange_name: &str,
        queue_name: &str,
        topic: &str,
    ) -> Result<Subscription, AmqpError>;

    /// Closes the channel, which ends every subscription made through it.
    async fn close_channel(&self) -> Result<(), AmqpError>;
}

/// Decoded messages of one subscription, in delivery order.
///
/// Yields `None` once the broker has closed the delivery stream and every buffered
/// message has been read.
///
/// Dropping the subscription makes the relay task cancel the broker consumer, in the
/// background. Messages already buffered for the reader are lost with it, since they
/// were auto-acknowledged. Use `cancel` to wait until the consumer is gone.
pub struct Subscription {
    receiver: mpsc::Receiver<Message>,
    relay: JoinHandle<()>,
}

impl Subscription {
    /// Waits for the next decoded message.
    ///
    /// # Returns
    /// The next message, or `None` once the delivery stream has closed
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Stops the subscription and waits until its broker consumer is cancelled.
    ///
    /// Deliveries not yet handed to the relay stay on the queue for other consumers.
    pub async fn cancel(self) {
        let Subscription { receiver, relay } = self;
        drop(receiver);

        if let Err(err) = relay.await {
            error!(error = err.to_string(), "subscription relay failed");
        }
    }

    /// True once the relay has stopped forwarding deliveries.
    pub fn is_relay_finished(&self) -> bool {
        self.relay.is_finished()
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.receiver.poll_recv(cx)
    }
}

/// Subscriber owning one channel.
pub struct RabbitMQSubscriber {
    channel: Arc<dyn AmqpChannel>,
    policy: FailurePolicy,
    buffer: usize,
}

impl RabbitMQSubscriber {
    /// Claims a new channel from `client`.
    pub async fn new(client: &dyn AmqpClient) -> Result<RabbitMQSubscriber, AmqpError> {
        let channel = client.create_channel().await?;

        Ok(RabbitMQSubscriber {
            channel,
            policy: FailurePolicy::default(),
            buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        })
    }

    /// Chooses what happens when a subscription cannot be established.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets how many decoded messages may wait for the reader.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    async fn setup(
        &self,
        exchange_name: &str,
        queue_name: &str,
        topic: &str,
    ) -> Result<(), (AmqpError, &'static str)> {
        let bound = !exchange_name.is_empty();

        if bound {
            declare_exchange(self.channel.as_ref(), exchange_name)
                .await
                .map_err(|err| (err, "error when declaring exchange"))?;
        }

        self.channel
            .queue_declare(&QueueDefinition::new(queue_name).durable())
            .await
            .map_err(|err| (err, "error when declaring queue"))?;

        if bound {
            let binding = QueueBinding::new(queue_name)
                .exchange(exchange_name)
                .routing_key(topic);

            self.channel
                .queue_bind(&binding)
                .await
                .map_err(|err| (err, "error when binding queue"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Subscriber for RabbitMQSubscriber {
    /// An empty `exchange_name` consumes from the default exchange: nothing is
    /// declared or bound besides the queue.
    ///
    /// Setup failures go through the failure policy, which exits the process by
    /// default.
    async fn subscribe(
        &self,
        exchange_name: &str,
        queue_name: &str,
        topic: &str,
    ) -> Result<Subscription, AmqpError> {
        if let Err((err, msg)) = self.setup(exchange_name, queue_name, topic).await {
            return Err(self.policy.handle(err, msg));
        }

        let consumer = ConsumerDefinition::default();
        let deliveries = match self
            .channel
            .basic_consume(queue_name, &consumer)
            .await
        {
            Ok(d) => d,
            Err(err) => return Err(self.policy.handle(err, "error when consuming queue")),
        };
        debug!("consuming queue: {}", queue_name);

        let (tx, receiver) = mpsc::channel(self.buffer);
        let relay = tokio::spawn(relay(
            deliveries,
            tx,
            self.channel.clone(),
            consumer.tag().to_owned(),
        ));

        Ok(Subscription { receiver, relay })
    }

    async fn close_channel(&self) -> Result<(), AmqpError> {
        self.channel.close().await
    }
}
