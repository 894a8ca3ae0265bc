// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Hosepipe Adapter
//!
//! The `AmqpError` enum covers every failure the adapter can surface: dialing the
//! broker, opening channels, declaring exchanges and queues, publishing, starting a
//! consumer and decoding deliveries.

use thiserror::Error;

/// Represents errors that can occur while talking to RabbitMQ.
///
/// Variants carry the name of the exchange or queue involved so the caller can tell
/// which stage of a publish or subscribe failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// The connection could not be established or is no longer open
    #[error("failure to connect")]
    ConnectionError,

    /// The broker refused to open a channel
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// The broker rejected the consume request on the given queue
    #[error("failure to start consuming queue `{0}`")]
    ConsumeStartError(String),

    /// Error publishing a message to the given exchange
    #[error("failure to publish to exchange `{0}`")]
    PublishingError(String),

    /// The message could not be serialized
    #[error("failure to encode message: {0}")]
    EncodeError(String),

    /// A delivery body is not a valid message
    #[error("failure to decode payload: {0}")]
    DecodeError(String),

    /// The delivery stream reported an error
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Closing a channel or the connection failed
    #[error("failure to close `{0}`")]
    CloseError(String),
}
