// MIT License - Copyright (c) 2026 Peter Wright
//
//! # panel-sms-bridge
//!
//! SMS communication engine for remote alarm control panels that speak
//! a line-oriented text protocol over plain SMS: arming and disarming,
//! status queries, user permissions, and a five-step bulk configuration
//! download (zones, scenarios, users).
//!
//! The transport carries no message IDs, no delivery guarantee, and no
//! ordering, so a sent command and its reply are correlated purely by
//! timing and response-content classification. The engine enforces a
//! strict single-outstanding-request discipline to keep that
//! correlation unambiguous, and drives the CONF1..CONF5 configuration
//! handshake on top of it.
//!
//! Platform concerns stay outside: the embedding application implements
//! [`SmsTransport`] over its messaging stack and forwards incoming SMS
//! into the engine, and implements (or reuses) a [`RecordStore`] for
//! the decoded records. No external dependencies beyond tokio,
//! thiserror, tracing, bitflags, and chrono.
//!
//! ## Quick Start
//!
//! ```no_run
//! use panel_sms_bridge::{EngineConfig, LinkedTransport, MemoryStore, SmsPanel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::builder()
//!         .panel_number("+393331234567")
//!         .build();
//!
//!     let (transport, mut outgoing) = LinkedTransport::new();
//!     let panel = SmsPanel::new(config, transport, MemoryStore::new());
//!
//!     tokio::spawn(async move {
//!         while let Some(sms) = outgoing.recv().await {
//!             // Hand sms.body to the real messaging stack here.
//!             println!("-> {}: {}", sms.destination, sms.body);
//!         }
//!     });
//!
//!     // Download the panel's configuration, then arm scenario 1.
//!     panel.run_configuration().await?;
//!     panel.arm_scenario(1).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod devices;
pub mod error;
pub mod event;
pub mod exchange;
pub mod panel;
pub mod protocol;
pub mod session;
pub mod store;
pub mod transport;

// Re-exports for convenience
pub use config::{EngineConfig, EngineConfigBuilder};
pub use devices::scenario::{CUSTOM_SCENARIO_BASE, ScenarioRecord};
pub use devices::system::{PanelStatus, StatusReport, StatusSnapshot, SystemBlock};
pub use devices::user::{PermissionFlags, UserRecord};
pub use devices::zone::{ZoneRecord, ZoneSet};
pub use error::{EngineError, Result};
pub use event::{EventReceiver, EventSender, PanelEvent, event_channel};
pub use exchange::ExchangeManager;
pub use panel::SmsPanel;
pub use protocol::{
    AckReport, Command, ConfStep, ParsedResponse, ResponseBody, ResponseKind, Termination, decode,
};
pub use session::{ConfigDownload, SessionLogEntry, SyncState};
pub use store::{MemoryStore, RecordStore};
pub use transport::{
    LinkedTransport, OutgoingSms, SendOutcome, SendTicket, SmsTransport, TransportHint,
};
