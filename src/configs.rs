// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Connection Settings
//!
//! `RabbitMQConfigs` holds what is needed to reach a broker. It can be built in code
//! or deserialized from any serde source; missing fields fall back to the settings of
//! a local development broker.

use serde::Deserialize;

/// Connection settings for a RabbitMQ broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    /// Name reported to the broker for the connection
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Virtual host, `/` being the broker default
    pub vhost: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            app_name: "hosepipe".to_owned(),
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    /// Renders the settings as an `amqp://` URI.
    ///
    /// The vhost is part of the URI path, so its slashes are percent-encoded.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2f")
        )
    }
}
