// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Failure Policy
//!
//! Some failures leave the adapter in a state it cannot recover from: the connection
//! cannot be closed, or a subscription cannot be established. The `FailurePolicy`
//! decides whether those failures halt the process or are handed back to the caller.

use crate::errors::AmqpError;
use tracing::error;

/// Exit code used when the policy halts the process.
pub const FATAL_EXIT_CODE: i32 = 1;

/// How unrecoverable failures are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and terminate the process.
    #[default]
    Exit,
    /// Log the failure and return it to the caller.
    Propagate,
}

impl FailurePolicy {
    /// Applies the policy to `err`.
    ///
    /// With `Exit` this never returns. With `Propagate` the error is returned so the
    /// caller can forward it with `Err(policy.handle(..))`.
    pub fn handle(&self, err: AmqpError, msg: &str) -> AmqpError {
        error!(error = err.to_string(), "{}", msg);

        match self {
            FailurePolicy::Exit => std::process::exit(FATAL_EXIT_CODE),
            FailurePolicy::Propagate => err,
        }
    }
}
