// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! This module provides the exchange definition sent to the broker on declaration and
//! the declarator used by publishers and subscribers. Hosepipe routes everything
//! through durable topic exchanges; direct and fanout definitions exist so a
//! conflicting redeclaration can be expressed.

use crate::{channel::AmqpChannel, errors::AmqpError};
use tracing::debug;

/// Represents the types of exchanges available in RabbitMQ.
///
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// Definition of a RabbitMQ exchange with its configuration parameters.
///
/// Two definitions are equal when the broker would treat a redeclaration as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) delete: bool,
    pub(crate) durable: bool,
    pub(crate) passive: bool,
    pub(crate) internal: bool,
    pub(crate) no_wait: bool,
}

impl ExchangeDefinition {
    /// Creates a new exchange definition with the given name.
    ///
    /// By default, the exchange is a non-durable Direct exchange.
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            kind: ExchangeKind::Direct,
            delete: false,
            durable: false,
            passive: false,
            internal: false,
            no_wait: false,
        }
    }

    /// The exchange hosepipe publishes to: durable topic, not auto-deleted, not
    /// internal, no arguments.
    pub fn topic(name: &str) -> ExchangeDefinition {
        ExchangeDefinition::new(name)
            .kind(ExchangeKind::Topic)
            .durable()
    }

    /// Sets the exchange type.
    ///
    /// # Parameters
    /// * `kind` - The exchange type
    ///
    /// # Returns
    /// Self for method chaining
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exchange_kind(&self) -> &ExchangeKind {
        &self.kind
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Auto-deleted exchanges disappear once their last binding is removed.
    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn is_no_wait(&self) -> bool {
        self.no_wait
    }
}

/// Ensures the topic exchange `name` exists.
///
/// Redeclaring an existing exchange with the same parameters is a no-op on the broker,
/// so this is safe to call before every publish. A name already bound to an exchange
/// with different parameters fails with `DeclareExchangeError`.
pub async fn declare_exchange(channel: &dyn AmqpChannel, name: &str) -> Result<(), AmqpError> {
    debug!("declaring exchange: {}", name);

    channel
        .exchange_declare(&ExchangeDefinition::topic(name))
        .await?;

    debug!("exchange: {} was declared", name);
    Ok(())
}
