// MIT License - Copyright (c) 2026 Peter Wright

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, oneshot};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::devices::system::StatusSnapshot;
use crate::error::{EngineError, Result};
use crate::event::{EventSender, PanelEvent};
use crate::protocol::{Command, ParsedResponse, ResponseBody, ResponseKind, decode};
use crate::store::RecordStore;
use crate::transport::{SendOutcome, SendTicket, SmsTransport};

/// The one command currently awaiting its reply.
struct PendingExchange {
    id: u64,
    command: Command,
    sent_at: Instant,
    reply_tx: oneshot::Sender<ParsedResponse>,
}

/// Correlates commands with panel replies over a transport that carries
/// no message IDs, no delivery guarantee, and no ordering.
///
/// Correlation is inferred purely from timing and response-content
/// classification, which only works if at most one command is ever in
/// flight: with two, an incoming reply could not be unambiguously
/// attributed. The single-slot discipline trades throughput for
/// correctness — acceptable because panel round-trips are already tens
/// of seconds. Do not replace it with a request-ID scheme; the panel
/// does not understand one.
///
/// All slot mutation happens under one mutex, so `send`, incoming
/// routing, cancellation, and timeout expiry are mutually exclusive.
pub struct ExchangeManager<T, S> {
    config: EngineConfig,
    transport: T,
    store: Arc<S>,
    event_tx: EventSender,
    pending: Mutex<Option<PendingExchange>>,
    next_id: AtomicU64,
}

impl<T: SmsTransport, S: RecordStore> ExchangeManager<T, S> {
    pub fn new(config: EngineConfig, transport: T, store: Arc<S>, event_tx: EventSender) -> Self {
        Self {
            config,
            transport,
            store,
            event_tx,
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether an exchange is currently awaiting its reply.
    pub async fn is_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Send a command and wait for its reply.
    ///
    /// Fails immediately with [`EngineError::ExchangeBusy`] if another
    /// exchange is awaiting its reply (the live exchange is untouched),
    /// and with a transport error if the messaging stack refuses the
    /// send (in which case no reply window is armed). Otherwise waits up
    /// to the configured reply timeout for a recognized reply.
    pub async fn send(&self, command: Command) -> Result<ParsedResponse> {
        if self.config.panel_number.is_empty() {
            return Err(EngineError::NoPanelNumber);
        }

        let wire = command.to_wire_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut slot = self.pending.lock().await;
            if let Some(pending) = slot.as_ref() {
                warn!(
                    pending = %pending.command,
                    refused = %wire,
                    "exchange slot busy, refusing command"
                );
                return Err(EngineError::ExchangeBusy);
            }
            *slot = Some(PendingExchange {
                id,
                command: command.clone(),
                sent_at: Instant::now(),
                reply_tx,
            });
        }

        debug!(command = %wire, "sending command");
        let ticket = match self
            .transport
            .transmit(&self.config.panel_number, &wire, self.config.transport_hint)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                // Nothing went out; free the slot without arming a timeout.
                self.clear_pending(id).await;
                warn!(command = %wire, error = %e, "transport refused send");
                return Err(e);
            }
        };
        debug!(command = %wire, ?ticket, "command handed to messaging stack");

        match timeout(self.config.reply_timeout, reply_rx).await {
            Ok(Ok(response)) => {
                debug!(command = %wire, kind = %response.kind, "reply correlated");
                Ok(response)
            }
            Ok(Err(_)) => {
                // Slot holder dropped our sender: explicit cancellation.
                debug!(command = %wire, "exchange cancelled");
                Err(EngineError::Cancelled)
            }
            Err(_) => {
                self.clear_pending(id).await;
                warn!(
                    command = %wire,
                    timeout_secs = self.config.reply_timeout.as_secs(),
                    "no reply within window"
                );
                Err(EngineError::ReplyTimeout { command: wire })
            }
        }
    }

    /// Route an incoming SMS.
    ///
    /// Called for every SMS the embedding application receives. Messages
    /// from senders other than the configured panel are dropped. With an
    /// exchange pending, an unrecognized body does **not** resolve it
    /// (some panels send free-text log messages before the real reply);
    /// a recognized body takes the slot and wakes the waiting caller.
    /// With no exchange pending, a spontaneous status broadcast is still
    /// decoded, persisted, and announced; anything else is dropped.
    pub async fn handle_incoming(&self, sender: &str, body: &str) {
        if !sender_matches(&self.config.panel_number, sender) {
            debug!(sender, "ignoring SMS from unrelated sender");
            return;
        }

        let kind = ResponseKind::classify(body);
        let mut slot = self.pending.lock().await;
        if slot.is_some() {
            if kind == ResponseKind::Unrecognized {
                debug!("unrecognized text while awaiting reply, keeping exchange open");
                return;
            }
            if let Some(pending) = slot.take() {
                debug!(
                    command = %pending.command,
                    kind = %kind,
                    elapsed_ms = pending.sent_at.elapsed().as_millis() as u64,
                    "resolving pending exchange"
                );
                if pending.reply_tx.send(decode(body)).is_err() {
                    debug!("waiter already gone, reply dropped");
                }
            }
            return;
        }
        drop(slot);

        if kind == ResponseKind::Status {
            let response = decode(body);
            if let ResponseBody::Status(report) = response.body {
                info!(status = %report.status, "spontaneous status broadcast");
                let snapshot = StatusSnapshot::now(report.status, report.scenario.clone());
                if let Err(e) = self.store.put_status(snapshot).await {
                    warn!(error = %e, "failed to persist spontaneous status");
                }
                let _ = self.event_tx.send(PanelEvent::SpontaneousStatus(report));
            }
        } else {
            debug!(kind = %kind, "dropping uncorrelated message");
        }
    }

    /// Record an OS-level send/delivery report. Telemetry only: a send
    /// outcome says nothing about the panel, so it never resolves an
    /// exchange — only an incoming reply can.
    pub async fn handle_send_outcome(&self, ticket: SendTicket, outcome: SendOutcome) {
        match &outcome {
            SendOutcome::Sent => debug!(?ticket, "message accepted by messaging stack"),
            SendOutcome::Failed { reason } => {
                warn!(?ticket, reason = %reason, "messaging stack reported send failure")
            }
        }
        let _ = self.event_tx.send(PanelEvent::SendOutcome { ticket, outcome });
    }

    /// Drop the pending exchange, if any, waking its caller with
    /// [`EngineError::Cancelled`]. Idempotent; a no-op when nothing is
    /// pending.
    pub async fn cancel(&self) {
        let mut slot = self.pending.lock().await;
        if let Some(pending) = slot.take() {
            debug!(command = %pending.command, "cancelling pending exchange");
            // Dropping the sender resolves the waiter.
        }
    }

    /// Remove the slot entry for exchange `id`, leaving any newer
    /// exchange alone. A reply may have raced the timeout and already
    /// handed the slot to a new command.
    async fn clear_pending(&self, id: u64) {
        let mut slot = self.pending.lock().await;
        if slot.as_ref().is_some_and(|p| p.id == id) {
            *slot = None;
        }
    }
}

/// Compare sender numbers leniently: exact match after stripping
/// formatting, or a suffix match so national and international forms of
/// the same number still correlate.
fn sender_matches(panel_number: &str, sender: &str) -> bool {
    let panel = normalize_number(panel_number);
    let sender = normalize_number(sender);
    if panel.is_empty() || sender.is_empty() {
        return false;
    }
    if panel == sender {
        return true;
    }
    let min_suffix = 8;
    (sender.len() >= min_suffix && panel.ends_with(&sender))
        || (panel.len() >= min_suffix && sender.ends_with(&panel))
}

fn normalize_number(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}
