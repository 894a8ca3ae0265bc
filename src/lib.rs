// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod channel;
pub mod client;
pub mod configs;
pub mod consumer;
pub mod errors;
pub mod exchange;
pub mod message;
pub mod policy;
pub mod publisher;
pub mod queue;
pub mod subscriber;

pub use client::{AmqpClient, RabbitMQClient};
pub use errors::AmqpError;
pub use message::Message;
pub use policy::FailurePolicy;
pub use publisher::{Publisher, RabbitMQPublisher};
pub use subscriber::{RabbitMQSubscriber, Subscriber, Subscription};
