//! # Bus Configuration
//!
//! Layered configuration for [`MessageBus`](crate::MessageBus). Sources are
//! merged in order, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional TOML, YAML or JSON file (format picked by extension)
//! 3. `COURIER_*` environment variables, e.g. `COURIER_CALL_TIMEOUT_MS=500`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use courier::{BusConfig, MessageBus};
//! use std::path::Path;
//!
//! # fn main() -> courier::BusResult<()> {
//! let config = BusConfig::load(Some(Path::new("config/courier.toml")))?;
//! let bus = MessageBus::new(config)?;
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BusError, BusResult};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "COURIER";

/// Runtime settings for a message bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Upper bound on how long `call` waits for a reply. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
    /// Upper bound on how long `stop` waits for in-flight work.
    pub drain_timeout_ms: Option<u64>,
    /// Log every dequeued envelope at debug level
    pub log_envelopes: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: None,
            drain_timeout_ms: None,
            log_envelopes: true,
        }
    }
}

impl BusConfig {
    /// Load from defaults, an optional file and `COURIER_*` variables.
    pub fn load(path: Option<&Path>) -> BusResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`BusConfig::load`] with a custom environment prefix.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> BusResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading bus configuration file");
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(env_prefix).try_parsing(true));

        let config: BusConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            call_timeout_ms = ?config.call_timeout_ms,
            drain_timeout_ms = ?config.drain_timeout_ms,
            log_envelopes = config.log_envelopes,
            "Bus configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.call_timeout_ms == Some(0) {
            return Err(BusError::InvalidConfiguration(
                "call_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.drain_timeout_ms == Some(0) {
            return Err(BusError::InvalidConfiguration(
                "drain_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Set `call_timeout_ms`. Durations beyond `u64::MAX` milliseconds
    /// saturate; a zero duration is rejected by [`BusConfig::validate`].
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Deployment environment from `COURIER_ENV` (or `APP_ENV`), defaulting to
/// `development`.
pub fn detect_environment() -> String {
    env::var("COURIER_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}
