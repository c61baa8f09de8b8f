// MIT License - Copyright (c) 2026 Peter Wright

use crate::protocol::ResponseKind;

/// All errors that can occur in the panel-sms-bridge library.
///
/// The codec itself never fails; every error here originates in the
/// transport, the correlation layer, or the panel's own `ERR:` replies.
/// Errors carry enough context (command text, step kind, panel code) to
/// render a human-readable message at the UI boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The messaging stack refused or failed the send (no signal, no SIM,
    /// permission denied). No reply timeout is armed for a failed send.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// No panel phone number is configured; nothing can be sent.
    #[error("no panel number configured")]
    NoPanelNumber,

    /// A slot argument was outside the range the panel supports.
    #[error("{what} slot {slot} out of range (1-{max})")]
    InvalidSlot { what: &'static str, slot: u8, max: u8 },

    /// Custom arming was requested with no zones selected.
    #[error("custom arming requires at least one zone")]
    NoZonesSelected,

    /// A command was issued while another exchange was still awaiting its
    /// reply. The live exchange is left untouched.
    #[error("another exchange is already awaiting a reply")]
    ExchangeBusy,

    /// A configuration download was started while one was already running.
    #[error("a configuration download is already running")]
    SessionActive,

    /// No recognized reply arrived within the configured window.
    #[error("no reply from panel: {command}")]
    ReplyTimeout { command: String },

    /// A reply arrived but its kind did not match what the current
    /// command or handshake step expects.
    #[error("unexpected reply: expected {expected}, got {got}")]
    Desync {
        expected: ResponseKind,
        got: ResponseKind,
    },

    /// The panel answered with an explicit `ERR:` reply. The code is
    /// opaque wire text, passed through verbatim for display or lookup.
    #[error("panel error {code}")]
    Panel { code: String },

    /// The exchange or session was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// The record store rejected a write.
    #[error("record store failure: {reason}")]
    Store { reason: String },
}

impl EngineError {
    /// Whether this error is transient and an outer policy layer may
    /// reasonably retry the command. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport { .. } | EngineError::ReplyTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
