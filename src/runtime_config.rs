//! # Runtime Configuration Module
//!
//! Environment-driven tuning for the dispatch pipeline. There are no
//! configuration files and no command line; an application that wants
//! different values builds a [`RuntimeConfig`] in code.
//!
//! ## Environment Variables
//!
//! ### `BYTEGO_DEBUG`
//!
//! `true`/`1`/`yes`/`on` enables debug mode: the default error handler puts
//! the text of unexpected errors in the response instead of a generic message.
//!
//! Default: off
//!
//! ### `BYTEGO_CONTEXT_POOL_MAX_IDLE`
//!
//! Maximum number of idle request contexts kept for reuse. Accepts decimal
//! (`1024`) or hexadecimal (`0x400`).
//!
//! Default: `1024`
//!
//! ### `BYTEGO_PARAMS_POOL_MAX_IDLE`
//!
//! Maximum number of idle parameter buffers kept by the router.
//!
//! Default: `1024`
//!
//! ### `BYTEGO_SLOW_REQUEST_MS`
//!
//! Requests slower than this are logged at warn level. `0` disables the check.
//!
//! Default: `1000`
//!
//! ## Usage
//!
//! ```rust
//! use bytego::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Context pool: {} idle", config.context_pool_max_idle);
//! ```
//!
//! ## Sizing the pools
//!
//! An idle slot costs one context (a few hundred bytes plus whatever buffer
//! capacity it retained). Keep `max_idle` near the expected peak of
//! concurrent requests; beyond that, released objects are simply dropped.

use std::env;
use std::time::Duration;

const DEFAULT_POOL_MAX_IDLE: usize = 1024;
const DEFAULT_SLOW_REQUEST_MS: u64 = 1000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Render unexpected error text in responses
    pub debug: bool,
    /// Idle request contexts kept by the application pool
    pub context_pool_max_idle: usize,
    /// Idle parameter buffers kept by the router pool
    pub params_pool_max_idle: usize,
    /// Threshold for the slow request warning (`None` disables it)
    pub slow_request: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            context_pool_max_idle: DEFAULT_POOL_MAX_IDLE,
            params_pool_max_idle: DEFAULT_POOL_MAX_IDLE,
            slow_request: Some(Duration::from_millis(DEFAULT_SLOW_REQUEST_MS)),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let debug = lookup("BYTEGO_DEBUG").map_or(defaults.debug, |v| parse_bool(&v));
        let context_pool_max_idle = lookup("BYTEGO_CONTEXT_POOL_MAX_IDLE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(defaults.context_pool_max_idle);
        let params_pool_max_idle = lookup("BYTEGO_PARAMS_POOL_MAX_IDLE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(defaults.params_pool_max_idle);
        let slow_request = match lookup("BYTEGO_SLOW_REQUEST_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.slow_request,
        };

        RuntimeConfig {
            debug,
            context_pool_max_idle,
            params_pool_max_idle,
            slow_request,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
