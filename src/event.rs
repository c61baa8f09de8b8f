// MIT License - Copyright (c) 2026 Peter Wright

use crate::devices::system::StatusReport;
use crate::protocol::ConfStep;
use crate::transport::{SendOutcome, SendTicket};

/// All events that can be emitted by the engine.
///
/// Consumers subscribe via `SmsPanel::subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PanelEvent>`.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// A command reply or status query updated the panel state.
    StatusChanged(StatusReport),
    /// The panel broadcast a status on its own, with no exchange pending.
    SpontaneousStatus(StatusReport),
    /// A configuration download step completed.
    ConfigProgress { step: ConfStep, percent: u8 },
    /// All five configuration steps completed and records are stored.
    ConfigComplete,
    /// The configuration download failed at the given step.
    ConfigFailed { step: ConfStep, reason: String },
    /// OS-level send/delivery report for a transmitted message.
    /// Telemetry only; never resolves an exchange.
    SendOutcome {
        ticket: SendTicket,
        outcome: SendOutcome,
    },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
