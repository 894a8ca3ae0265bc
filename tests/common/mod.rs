// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! In-memory topic broker implementing the channel and client seams, so publishers
//! and subscribers can be exercised end to end without a RabbitMQ server.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use hosepipe::{
    channel::{AmqpChannel, DeliveryStream, RawMessage},
    consumer::ConsumerDefinition,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    AmqpClient, AmqpError,
};
use lapin::types::{AMQPValue, ShortString};
use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;

type Sender = mpsc::UnboundedSender<Result<RawMessage, AmqpError>>;

struct Consumer {
    channel: usize,
    tag: String,
    sender: Sender,
}

struct Queue {
    def: QueueDefinition,
    pending: VecDeque<RawMessage>,
    consumers: Vec<Consumer>,
}

#[derive(Default)]
struct State {
    connected: bool,
    next_channel: usize,
    closed_channels: HashSet<usize>,
    exchanges: HashMap<String, ExchangeDefinition>,
    queues: HashMap<String, Queue>,
    bindings: Vec<QueueBinding>,
}

impl State {
    fn route(&mut self, msg: RawMessage) {
        let targets: Vec<String> = if msg.exchange.is_empty() {
            vec![msg.routing_key.clone()]
        } else {
            self.bindings
                .iter()
                .filter(|b| {
                    b.exchange_name() == msg.exchange && topic_matches(b.key(), &msg.routing_key)
                })
                .map(|b| b.queue_name().to_owned())
                .collect()
        };

        for name in targets {
            if let Some(queue) = self.queues.get_mut(&name) {
                queue.deliver(msg.clone());
            }
        }
    }
}

impl Queue {
    fn deliver(&mut self, msg: RawMessage) {
        while let Some(consumer) = self.consumers.first() {
            if consumer.sender.send(Ok(msg.clone())).is_ok() {
                return;
            }
            self.consumers.remove(0);
        }
        self.pending.push_back(msg);
    }
}

/// Matches a routing key against a binding pattern: `*` is one word, `#` zero or more.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    fn go(pattern: &[&str], key: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((&"#", rest)) => (0..=key.len()).any(|skip| go(rest, &key[skip..])),
            Some((word, rest)) => match key.split_first() {
                Some((k, key_rest)) => (*word == "*" || word == k) && go(rest, key_rest),
                None => false,
            },
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    go(&pattern, &key)
}

#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> MemoryBroker {
        MemoryBroker {
            state: Arc::new(Mutex::new(State {
                connected: true,
                ..Default::default()
            })),
        }
    }

    /// Enqueues a raw body on `queue`, bypassing exchanges and encoding.
    pub fn push_raw(&self, queue: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.route(RawMessage {
            routing_key: queue.to_owned(),
            data: data.to_vec(),
            ..Default::default()
        });
    }

    /// Bodies waiting on `queue` with no consumer to take them.
    pub fn pending(&self, queue: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .queues
            .get(queue)
            .map(|q| q.pending.iter().map(|m| m.data.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state.lock().unwrap().exchanges.contains_key(name)
    }

    pub fn queue(&self, name: &str) -> Option<QueueDefinition> {
        let state = self.state.lock().unwrap();
        state.queues.get(name).map(|q| q.def.clone())
    }

    /// Consumers currently registered on `queue`.
    pub fn consumer_count(&self, queue: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.queues.get(queue).map(|q| q.consumers.len()).unwrap_or_default()
    }

    pub fn bindings(&self) -> Vec<QueueBinding> {
        self.state.lock().unwrap().bindings.clone()
    }
}

#[async_trait]
impl AmqpClient for MemoryBroker {
    async fn create_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(AmqpError::ConnectionError);
        }

        state.next_channel += 1;
        Ok(Arc::new(MemoryChannel {
            id: state.next_channel,
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<(), AmqpError> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        for queue in state.queues.values_mut() {
            queue.consumers.clear();
        }
        Ok(())
    }
}

pub struct MemoryChannel {
    id: usize,
    state: Arc<Mutex<State>>,
}

impl MemoryChannel {
    fn open_state(&self) -> Option<std::sync::MutexGuard<'_, State>> {
        let state = self.state.lock().unwrap();
        (state.connected && !state.closed_channels.contains(&self.id)).then_some(state)
    }
}

#[async_trait]
impl AmqpChannel for MemoryChannel {
    async fn exchange_declare(&self, def: &ExchangeDefinition) -> Result<(), AmqpError> {
        let err = || AmqpError::DeclareExchangeError(def.name().to_owned());
        let mut state = self.open_state().ok_or_else(err)?;

        // the default exchange cannot be redeclared (ACCESS_REFUSED)
        if def.name().is_empty() {
            return Err(err());
        }

        match state.exchanges.get(def.name()) {
            Some(existing) if existing != def => Err(err()),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(def.name().to_owned(), def.clone());
                Ok(())
            }
        }
    }

    async fn queue_declare(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        let err = || AmqpError::DeclareQueueError(def.name().to_owned());
        let mut state = self.open_state().ok_or_else(err)?;

        match state.queues.get(def.name()) {
            Some(existing) if existing.def != *def => Err(err()),
            Some(_) => Ok(()),
            None => {
                state.queues.insert(
                    def.name().to_owned(),
                    Queue {
                        def: def.clone(),
                        pending: VecDeque::new(),
                        consumers: vec![],
                    },
                );
                Ok(())
            }
        }
    }

    async fn queue_bind(&self, binding: &QueueBinding) -> Result<(), AmqpError> {
        let err = || {
            AmqpError::BindingExchangeToQueueError(
                binding.exchange_name().to_owned(),
                binding.queue_name().to_owned(),
            )
        };
        let mut state = self.open_state().ok_or_else(err)?;

        if !state.exchanges.contains_key(binding.exchange_name())
            || !state.queues.contains_key(binding.queue_name())
        {
            return Err(err());
        }
        if !state.bindings.contains(binding) {
            state.bindings.push(binding.clone());
        }
        Ok(())
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        headers: BTreeMap<ShortString, AMQPValue>,
    ) -> Result<(), AmqpError> {
        let err = || AmqpError::PublishingError(exchange.to_owned());
        let mut state = self.open_state().ok_or_else(err)?;

        if !exchange.is_empty() && !state.exchanges.contains_key(exchange) {
            return Err(err());
        }

        state.route(RawMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            headers,
            data: payload.to_vec(),
        });
        Ok(())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        def: &ConsumerDefinition,
    ) -> Result<DeliveryStream, AmqpError> {
        let err = || AmqpError::ConsumeStartError(queue.to_owned());
        let mut state = self.open_state().ok_or_else(err)?;
        let queue = state.queues.get_mut(queue).ok_or_else(err)?;

        if !def.is_auto_ack() {
            return Err(err());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        for msg in queue.pending.drain(..) {
            let _ = sender.send(Ok(msg));
        }
        queue.consumers.push(Consumer {
            channel: self.id,
            tag: def.tag().to_owned(),
            sender,
        });

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed())
    }

    async fn basic_cancel(&self, tag: &str) -> Result<(), AmqpError> {
        let mut state = self
            .open_state()
            .ok_or_else(|| AmqpError::ConsumerError(tag.to_owned()))?;

        for queue in state.queues.values_mut() {
            queue
                .consumers
                .retain(|c| c.channel != self.id || c.tag != tag);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AmqpError> {
        let mut state = self.state.lock().unwrap();
        state.closed_channels.insert(self.id);
        for queue in state.queues.values_mut() {
            queue.consumers.retain(|c| c.channel != self.id);
        }
        Ok(())
    }
}
