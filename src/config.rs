// MIT License - Copyright (c) 2026 Peter Wright

use tokio::time::Duration;

use crate::transport::TransportHint;

/// Configuration for talking to an SMS panel.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The panel's phone number. Empty means unconfigured; every send
    /// fails until one is set.
    pub panel_number: String,
    /// How long to wait for a recognized reply before giving up.
    /// Uniform for ordinary commands and configuration steps alike:
    /// panel round-trips are tens of seconds either way.
    pub reply_timeout: Duration,
    /// Retry budget for an outer policy layer. The engine itself never
    /// retries a command.
    pub command_retries: u32,
    /// Channel-selection hint handed to the transport on every send.
    pub transport_hint: TransportHint,
    /// Capacity of the broadcast event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            panel_number: String::new(),
            reply_timeout: Duration::from_secs(60),
            command_retries: 3,
            transport_hint: TransportHint::Default,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn panel_number(mut self, number: impl Into<String>) -> Self {
        self.config.panel_number = number.into();
        self
    }

    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    pub fn command_retries(mut self, retries: u32) -> Self {
        self.config.command_retries = retries;
        self
    }

    pub fn transport_hint(mut self, hint: TransportHint) -> Self {
        self.config.transport_hint = hint;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
