// MIT License - Copyright (c) 2026 Peter Wright

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::error::{EngineError, Result};

/// Opaque handle to one submitted message, echoed back by the
/// messaging stack's send/delivery reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendTicket(pub u64);

/// OS-level outcome of a submitted message.
///
/// This is telemetry about the messaging stack, not about the panel:
/// only an incoming reply can resolve an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The messaging stack accepted or delivered the message.
    Sent,
    /// The messaging stack reported a failure after accepting the send.
    Failed { reason: String },
}

/// Channel-selection hint passed through to the platform messaging
/// stack. Carrier and SIM policy live entirely outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportHint {
    /// Let the platform pick its default messaging channel.
    #[default]
    Default,
    /// Prefer a specific SIM/subscription slot.
    SimSlot(u8),
}

/// The outbound SMS seam.
///
/// `transmit` is fire-and-forget: a returned ticket only means the
/// messaging stack accepted the message for sending. Incoming SMS and
/// send outcomes are pushed into the engine by the embedding
/// application (see [`SmsPanel::handle_incoming`] and
/// [`SmsPanel::handle_send_outcome`]).
///
/// [`SmsPanel::handle_incoming`]: crate::panel::SmsPanel::handle_incoming
/// [`SmsPanel::handle_send_outcome`]: crate::panel::SmsPanel::handle_send_outcome
#[allow(async_fn_in_trait)]
pub trait SmsTransport: Send + Sync {
    /// Hand one message body to the messaging stack.
    async fn transmit(&self, destination: &str, body: &str, hint: TransportHint)
    -> Result<SendTicket>;
}

/// One message captured by [`LinkedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSms {
    pub ticket: SendTicket,
    pub destination: String,
    pub body: String,
    pub hint: TransportHint,
}

/// In-process transport for tests and the simulator binary: transmitted
/// messages land on an unbounded channel for the harness to inspect,
/// and the harness feeds panel replies back through the engine's
/// incoming entry point.
pub struct LinkedTransport {
    outgoing_tx: mpsc::UnboundedSender<OutgoingSms>,
    next_ticket: AtomicU64,
}

impl LinkedTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingSms>) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing_tx,
                next_ticket: AtomicU64::new(1),
            },
            outgoing_rx,
        )
    }
}

impl SmsTransport for LinkedTransport {
    async fn transmit(
        &self,
        destination: &str,
        body: &str,
        hint: TransportHint,
    ) -> Result<SendTicket> {
        let ticket = SendTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        self.outgoing_tx
            .send(OutgoingSms {
                ticket,
                destination: destination.to_string(),
                body: body.to_string(),
                hint,
            })
            .map_err(|_| EngineError::Transport {
                reason: "outgoing channel closed".to_string(),
            })?;
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_linked_transport_captures_messages() {
        let (transport, mut outgoing) = LinkedTransport::new();
        let ticket = transport
            .transmit("+390000000000", "SYS?", TransportHint::Default)
            .await
            .unwrap();

        let sms = outgoing.recv().await.unwrap();
        assert_eq!(sms.ticket, ticket);
        assert_eq!(sms.destination, "+390000000000");
        assert_eq!(sms.body, "SYS?");
    }

    #[tokio::test]
    async fn test_linked_transport_tickets_are_unique() {
        let (transport, _outgoing) = LinkedTransport::new();
        let a = transport
            .transmit("1", "SYS?", TransportHint::Default)
            .await
            .unwrap();
        let b = transport
            .transmit("1", "SYS?", TransportHint::SimSlot(1))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_linked_transport_errors_when_receiver_dropped() {
        let (transport, outgoing) = LinkedTransport::new();
        drop(outgoing);
        let err = transport
            .transmit("1", "SYS?", TransportHint::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport { .. }));
    }
}
