// MIT License - Copyright (c) 2026 Peter Wright

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::devices::system::{StatusReport, StatusSnapshot, SystemBlock};
use crate::devices::user::PermissionFlags;
use crate::devices::zone::ZoneSet;
use crate::error::{EngineError, Result};
use crate::event::{EventReceiver, EventSender, PanelEvent, event_channel};
use crate::exchange::ExchangeManager;
use crate::protocol::{AckReport, Command, ParsedResponse, ResponseBody, ResponseKind};
use crate::session::{ConfigDownload, SessionLogEntry, SyncState};
use crate::store::RecordStore;
use crate::transport::{SendOutcome, SendTicket, SmsTransport};

/// The main public API for controlling an SMS alarm panel.
///
/// One instance is constructed at session scope and handed to callers;
/// there is no global receiver or singleton state. The embedding
/// application forwards every incoming SMS to [`handle_incoming`] and
/// every OS send report to [`handle_send_outcome`]; both may be called
/// from any task, since internal state is owned by the exchange layer
/// behind its own lock.
///
/// # Example
///
/// ```no_run
/// use panel_sms_bridge::{EngineConfig, LinkedTransport, MemoryStore, SmsPanel};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = EngineConfig::builder()
///         .panel_number("+393331234567")
///         .build();
///     let (transport, mut outgoing) = LinkedTransport::new();
///     let panel = SmsPanel::new(config, transport, MemoryStore::new());
///
///     // Print what the engine sends.
///     tokio::spawn(async move {
///         while let Some(sms) = outgoing.recv().await {
///             println!("-> {}: {}", sms.destination, sms.body);
///         }
///     });
///
///     // Watch engine events.
///     let mut events = panel.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("event: {:?}", event);
///         }
///     });
///
///     let report = panel.query_status().await?;
///     println!("panel is {}", report.status);
///     Ok(())
/// }
/// ```
///
/// [`handle_incoming`]: Self::handle_incoming
/// [`handle_send_outcome`]: Self::handle_send_outcome
pub struct SmsPanel<T, S> {
    exchange: Arc<ExchangeManager<T, S>>,
    session: ConfigDownload<T, S>,
    store: Arc<S>,
    event_tx: EventSender,
}

impl<T: SmsTransport, S: RecordStore> SmsPanel<T, S> {
    pub fn new(config: EngineConfig, transport: T, store: S) -> Self {
        let (event_tx, _event_rx) = event_channel(config.event_capacity);
        let store = Arc::new(store);
        let exchange = Arc::new(ExchangeManager::new(
            config,
            transport,
            store.clone(),
            event_tx.clone(),
        ));
        let session = ConfigDownload::new(exchange.clone(), store.clone(), event_tx.clone());
        Self {
            exchange,
            session,
            store,
            event_tx,
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// The record store this engine writes to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Whether a command is currently awaiting its reply.
    pub async fn exchange_pending(&self) -> bool {
        self.exchange.is_pending().await
    }

    // --- Transport fan-in ---

    /// Feed one incoming SMS into the engine.
    pub async fn handle_incoming(&self, sender: &str, body: &str) {
        self.exchange.handle_incoming(sender, body).await;
    }

    /// Feed one OS-level send/delivery report into the engine.
    pub async fn handle_send_outcome(&self, ticket: SendTicket, outcome: SendOutcome) {
        self.exchange.handle_send_outcome(ticket, outcome).await;
    }

    // --- Commands ---

    /// Arm a predefined scenario (slot 1..=16).
    pub async fn arm_scenario(&self, slot: u8) -> Result<AckReport> {
        if !(1..=16).contains(&slot) {
            return Err(EngineError::InvalidSlot {
                what: "scenario",
                slot,
                max: 16,
            });
        }
        debug!(slot, "arming scenario");
        let response = self.exchange.send(Command::ArmScenario { slot }).await?;
        self.conclude_ack(response).await
    }

    /// Arm an ad-hoc selection of zones.
    pub async fn arm_custom(&self, zones: ZoneSet) -> Result<AckReport> {
        if zones.is_empty() {
            return Err(EngineError::NoZonesSelected);
        }
        debug!(zones = %zones.digits(), "arming custom zone selection");
        let response = self.exchange.send(Command::ArmCustom { zones }).await?;
        self.conclude_ack(response).await
    }

    /// Disarm the panel.
    pub async fn disarm(&self) -> Result<AckReport> {
        debug!("disarming");
        let response = self.exchange.send(Command::Disarm).await?;
        self.conclude_ack(response).await
    }

    /// Query the panel's current status and persist the snapshot.
    pub async fn query_status(&self) -> Result<StatusReport> {
        debug!("querying status");
        let response = self.exchange.send(Command::StatusQuery).await?;
        match response.body {
            ResponseBody::Status(report) => {
                info!(status = %report.status, "status report received");
                self.store
                    .put_status(StatusSnapshot::now(report.status, report.scenario.clone()))
                    .await?;
                let _ = self.event_tx.send(PanelEvent::StatusChanged(report.clone()));
                Ok(report)
            }
            ResponseBody::Error { code } => Err(EngineError::Panel { code }),
            _ => Err(EngineError::Desync {
                expected: ResponseKind::Status,
                got: response.kind,
            }),
        }
    }

    /// Push a user's permission bits to the panel (slot 1..=16).
    ///
    /// Provisional: the `SET:U` command is defined by the wire table but
    /// its panel-side handling has not been confirmed end-to-end.
    pub async fn set_user_permissions(
        &self,
        slot: u8,
        permissions: PermissionFlags,
    ) -> Result<AckReport> {
        if !(1..=16).contains(&slot) {
            return Err(EngineError::InvalidSlot {
                what: "user",
                slot,
                max: 16,
            });
        }
        debug!(slot, bits = %permissions.to_bit_string(), "updating user permissions");
        let response = self
            .exchange
            .send(Command::SetUserPermissions { slot, permissions })
            .await?;
        self.conclude_ack(response).await
    }

    /// Cancel the pending command exchange, if any, without waiting for
    /// its reply. Idempotent.
    pub async fn cancel_exchange(&self) {
        self.exchange.cancel().await;
    }

    // --- Configuration download ---

    /// Run the five-step configuration download to completion.
    ///
    /// Sequential and cancellable; see [`ConfigDownload`] for the step
    /// discipline. Progress is reported on the event bus.
    pub async fn run_configuration(&self) -> Result<()> {
        self.session.run().await
    }

    /// Abort a running configuration download. Records persisted by
    /// completed steps are kept.
    pub fn cancel_configuration(&self) {
        self.session.cancel();
    }

    pub async fn configuration_state(&self) -> SyncState {
        self.session.state().await
    }

    pub async fn configuration_percent(&self) -> u8 {
        self.session.percent_complete().await
    }

    pub async fn configuration_log(&self) -> Vec<SessionLogEntry> {
        self.session.log().await
    }

    /// The CONF1 system block (firmware, account role, option flags)
    /// from the last download, if step 1 completed.
    pub async fn system_info(&self) -> Option<SystemBlock> {
        self.session.system_info().await
    }

    /// Interpret a command reply: an acknowledgment updates the stored
    /// status, an `ERR:` surfaces the panel's code, anything else is a
    /// desync.
    async fn conclude_ack(&self, response: ParsedResponse) -> Result<AckReport> {
        match response.body {
            ResponseBody::Ack(ack) => {
                info!(status = %ack.status, scenario = ?ack.scenario, "command acknowledged");
                self.store
                    .put_status(StatusSnapshot::now(ack.status, ack.scenario.clone()))
                    .await?;
                let _ = self.event_tx.send(PanelEvent::StatusChanged(StatusReport {
                    status: ack.status,
                    scenario: ack.scenario.clone(),
                    zones_raw: None,
                }));
                Ok(ack)
            }
            ResponseBody::Error { code } => Err(EngineError::Panel { code }),
            _ => Err(EngineError::Desync {
                expected: ResponseKind::Ack,
                got: response.kind,
            }),
        }
    }
}
