// MIT License - Copyright (c) 2026 Peter Wright

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::devices::system::SystemBlock;
use crate::error::{EngineError, Result};
use crate::event::{EventSender, PanelEvent};
use crate::exchange::ExchangeManager;
use crate::protocol::{Command, ConfStep, ParsedResponse, ResponseBody};
use crate::store::RecordStore;
use crate::transport::SmsTransport;

/// State of the configuration download.
///
/// Moves only forward through the steps, or to `Failed`, or back to
/// `Idle` on cancel. `Failed` is terminal for the run, not for the
/// engine: a new run always restarts from step 1, since the panel's
/// configuration may have changed in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Step(ConfStep),
    Complete,
    Failed,
}

/// One timestamped line of the session's progress log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SyncState,
    percent: u8,
    log: Vec<SessionLogEntry>,
    system_info: Option<SystemBlock>,
}

/// The CONF1..CONF5 bulk configuration download.
///
/// Issues the five queries strictly in sequence over the exchange
/// layer, persists each decoded block before advancing, and reports
/// step-level progress on the event bus. A reply of the wrong kind for
/// the current step fails the run (protocol desync is surfaced, never
/// silently skipped), as does a step timeout; there is no automatic
/// retry and no step-level resume.
///
/// Cancelling mid-run keeps the records persisted by completed steps:
/// each step fully replaces its own record set, so re-running the
/// download later is idempotent.
pub struct ConfigDownload<T, S> {
    exchange: Arc<ExchangeManager<T, S>>,
    store: Arc<S>,
    event_tx: EventSender,
    inner: RwLock<SessionInner>,
    cancel_tx: watch::Sender<bool>,
}

impl<T: SmsTransport, S: RecordStore> ConfigDownload<T, S> {
    pub fn new(
        exchange: Arc<ExchangeManager<T, S>>,
        store: Arc<S>,
        event_tx: EventSender,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            exchange,
            store,
            event_tx,
            inner: RwLock::new(SessionInner::default()),
            cancel_tx,
        }
    }

    pub async fn state(&self) -> SyncState {
        self.inner.read().await.state
    }

    /// Download progress, 20% per completed step.
    pub async fn percent_complete(&self) -> u8 {
        self.inner.read().await.percent
    }

    pub async fn log(&self) -> Vec<SessionLogEntry> {
        self.inner.read().await.log.clone()
    }

    /// The CONF1 system block from the current/last run, if that step
    /// completed.
    pub async fn system_info(&self) -> Option<SystemBlock> {
        self.inner.read().await.system_info.clone()
    }

    /// Run the whole download, from step 1, to completion.
    ///
    /// Fails without leaving `Idle` when no panel number is configured.
    /// Fails with [`EngineError::SessionActive`] if a run is already in
    /// progress; a completed or failed session may be re-run freely.
    pub async fn run(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            if matches!(inner.state, SyncState::Step(_)) {
                return Err(EngineError::SessionActive);
            }
            if self.exchange.config().panel_number.is_empty() {
                warn!("configuration download refused: no panel number configured");
                return Err(EngineError::NoPanelNumber);
            }
            inner.state = SyncState::Step(ConfStep::Conf1);
            inner.percent = 0;
            inner.system_info = None;
            inner.log.clear();
            push_log(&mut inner, "configuration download started");
        }
        self.cancel_tx.send_replace(false);
        let mut cancel_rx = self.cancel_tx.subscribe();

        info!("starting configuration download");

        for step in ConfStep::ALL {
            if *cancel_rx.borrow() {
                return self.cancelled(step).await;
            }
            {
                let mut inner = self.inner.write().await;
                inner.state = SyncState::Step(step);
                push_log(&mut inner, format!("requesting CONF{}", step.number()));
            }

            let command = Command::ConfQuery { step };
            let response = tokio::select! {
                response = self.exchange.send(command) => response,
                _ = async { let _ = cancel_rx.wait_for(|cancelled| *cancelled).await; } => {
                    self.exchange.cancel().await;
                    return self.cancelled(step).await;
                }
            };

            match response {
                Ok(response) => {
                    if let Err(e) = self.complete_step(step, response).await {
                        self.fail(step, &e).await;
                        return Err(e);
                    }
                }
                Err(e) => {
                    self.fail(step, &e).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.store.mark_configured(true).await {
            self.fail(ConfStep::Conf5, &e).await;
            return Err(e);
        }

        {
            let mut inner = self.inner.write().await;
            inner.state = SyncState::Complete;
            push_log(&mut inner, "configuration download complete");
        }
        info!("configuration download complete");
        let _ = self.event_tx.send(PanelEvent::ConfigComplete);
        Ok(())
    }

    /// Abort the current run, if any. The run returns
    /// [`EngineError::Cancelled`] and the session goes back to `Idle`;
    /// records persisted by completed steps are kept. Idempotent.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Verify the reply kind, persist the decoded block, and advance
    /// the progress counter.
    async fn complete_step(&self, step: ConfStep, response: ParsedResponse) -> Result<()> {
        let expected = step.response_kind();
        if response.kind != expected {
            // A desynchronized panel answers with something recognizable
            // but wrong for this step; an explicit ERR: is its own case.
            return Err(match response.body {
                ResponseBody::Error { code } => EngineError::Panel { code },
                _ => EngineError::Desync {
                    expected,
                    got: response.kind,
                },
            });
        }

        match response.body {
            ResponseBody::Conf1(block) => {
                if let Some(firmware) = &block.firmware {
                    info!(firmware = %firmware, main_account = block.is_main, "panel identity");
                }
                self.store.put_zones(block.zones.clone()).await?;
                self.inner.write().await.system_info = Some(block);
            }
            ResponseBody::Scenarios(scenarios) => {
                debug!(count = scenarios.len(), step = step.number(), "storing scenarios");
                self.store.put_scenarios(scenarios).await?;
            }
            ResponseBody::Users(users) => {
                debug!(count = users.len(), step = step.number(), "storing users");
                self.store.put_users(users).await?;
            }
            // Unreachable given the kind check, but decoding is total.
            _ => {
                return Err(EngineError::Desync {
                    expected,
                    got: response.kind,
                });
            }
        }

        let percent = step.percent_complete();
        {
            let mut inner = self.inner.write().await;
            inner.percent = percent;
            push_log(
                &mut inner,
                format!("CONF{} stored ({percent}%)", step.number()),
            );
        }
        let _ = self
            .event_tx
            .send(PanelEvent::ConfigProgress { step, percent });
        Ok(())
    }

    async fn fail(&self, step: ConfStep, error: &EngineError) {
        warn!(step = step.number(), error = %error, "configuration download failed");
        {
            let mut inner = self.inner.write().await;
            inner.state = SyncState::Failed;
            push_log(
                &mut inner,
                format!("CONF{} failed: {error}", step.number()),
            );
        }
        let _ = self.event_tx.send(PanelEvent::ConfigFailed {
            step,
            reason: error.to_string(),
        });
    }

    async fn cancelled(&self, step: ConfStep) -> Result<()> {
        info!(step = step.number(), "configuration download cancelled");
        {
            let mut inner = self.inner.write().await;
            inner.state = SyncState::Idle;
            push_log(
                &mut inner,
                format!("download cancelled during CONF{}", step.number()),
            );
        }
        Err(EngineError::Cancelled)
    }
}

fn push_log(inner: &mut SessionInner, message: impl Into<String>) {
    inner.log.push(SessionLogEntry {
        at: Utc::now(),
        message: message.into(),
    });
}
