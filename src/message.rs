// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Hosepipe Message
//!
//! The payload exchanged between publishers and subscribers: a JSON object with
//! application-defined fields. Bodies are encoded with `serde_json`; anything that is
//! not a JSON object fails to decode.

use crate::errors::AmqpError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content type set on every published message
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A JSON object carried as a message body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Message {
        Message::default()
    }

    /// Builds a message from any value serializing to a JSON object.
    ///
    /// # Parameters
    /// * `value` - An application value, typically a struct deriving `Serialize`
    ///
    /// # Returns
    /// The message, or `EncodeError` when `value` is not a JSON object
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Message, AmqpError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => Ok(Message(fields)),
            Ok(other) => Err(AmqpError::EncodeError(format!(
                "expected a JSON object, got `{}`",
                other
            ))),
            Err(err) => Err(AmqpError::EncodeError(err.to_string())),
        }
    }

    /// Converts the message into an application type.
    ///
    /// # Returns
    /// The typed value, or `DecodeError` when the fields do not match `T`
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, AmqpError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|err| AmqpError::DecodeError(err.to_string()))
    }

    /// Sets a field.
    ///
    /// # Parameters
    /// * `key` - The field name
    /// * `value` - Any value convertible to JSON
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    /// Sets a field in place.
    ///
    /// # Returns
    /// The previous value of the field, if any
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_owned(), value.into())
    }

    /// Looks up a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields, ordered by name.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// True when the message has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Message {
    fn from(fields: Map<String, Value>) -> Self {
        Message(fields)
    }
}

/// Serializes a message into a delivery body.
///
/// # Parameters
/// * `msg` - The message to publish
///
/// # Returns
/// The JSON bytes, or `EncodeError`
pub fn encode(msg: &Message) -> Result<Vec<u8>, AmqpError> {
    serde_json::to_vec(msg).map_err(|err| AmqpError::EncodeError(err.to_string()))
}

/// Parses a delivery body into a message.
///
/// # Parameters
/// * `body` - The raw delivery body
///
/// # Returns
/// The message, or `DecodeError` when `body` is not a JSON object
pub fn decode(body: &[u8]) -> Result<Message, AmqpError> {
    serde_json::from_slice(body).map_err(|err| AmqpError::DecodeError(err.to_string()))
}
