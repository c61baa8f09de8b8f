// MIT License - Copyright (c) 2026 Peter Wright

use tokio::sync::RwLock;

use crate::devices::scenario::ScenarioRecord;
use crate::devices::system::StatusSnapshot;
use crate::devices::user::UserRecord;
use crate::devices::zone::ZoneRecord;
use crate::error::Result;

/// Durable storage for decoded panel records.
///
/// Written by the configuration download and by command handlers, read
/// by the embedding application. Writes must complete before a
/// configuration step advances, so "step N done" implies "step N's
/// records are stored".
///
/// Slot semantics: each configuration block enumerates its full slot
/// range (unequipped slots arrive as `NE` rather than being omitted),
/// so replacing by slot is a full replace of that block's record set.
/// Locally created custom scenarios live outside the panel's slot range
/// and must never be touched by `put_scenarios`.
#[allow(async_fn_in_trait)]
pub trait RecordStore: Send + Sync {
    async fn put_zones(&self, zones: Vec<ZoneRecord>) -> Result<()>;
    async fn put_scenarios(&self, scenarios: Vec<ScenarioRecord>) -> Result<()>;
    async fn put_users(&self, users: Vec<UserRecord>) -> Result<()>;
    async fn put_status(&self, snapshot: StatusSnapshot) -> Result<()>;
    async fn mark_configured(&self, configured: bool) -> Result<()>;
}

/// In-memory record store.
///
/// The default store for tests, the simulator, and embedders that keep
/// their own persistence outside the engine.
#[derive(Debug, Default)]
pub struct MemoryStore {
    zones: RwLock<Vec<ZoneRecord>>,
    scenarios: RwLock<Vec<ScenarioRecord>>,
    users: RwLock<Vec<UserRecord>>,
    status: RwLock<Option<StatusSnapshot>>,
    configured: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a locally created custom scenario (replacing any
    /// existing one in the same slot).
    pub async fn add_custom_scenario(&self, scenario: ScenarioRecord) {
        let mut scenarios = self.scenarios.write().await;
        scenarios.retain(|s| s.slot != scenario.slot);
        scenarios.push(scenario);
        scenarios.sort_by_key(|s| s.slot);
    }

    // --- Snapshots ---

    pub async fn zones(&self) -> Vec<ZoneRecord> {
        self.zones.read().await.clone()
    }

    pub async fn scenarios(&self) -> Vec<ScenarioRecord> {
        self.scenarios.read().await.clone()
    }

    pub async fn users(&self) -> Vec<UserRecord> {
        self.users.read().await.clone()
    }

    pub async fn status(&self) -> Option<StatusSnapshot> {
        self.status.read().await.clone()
    }

    pub async fn is_configured(&self) -> bool {
        *self.configured.read().await
    }
}

impl RecordStore for MemoryStore {
    async fn put_zones(&self, zones: Vec<ZoneRecord>) -> Result<()> {
        let mut stored = self.zones.write().await;
        stored.retain(|z| !zones.iter().any(|n| n.slot == z.slot));
        stored.extend(zones);
        stored.sort_by_key(|z| z.slot);
        Ok(())
    }

    async fn put_scenarios(&self, scenarios: Vec<ScenarioRecord>) -> Result<()> {
        let mut stored = self.scenarios.write().await;
        // Replace predefined slots only; customs are local property.
        stored.retain(|s| s.is_custom || !scenarios.iter().any(|n| n.slot == s.slot));
        stored.extend(scenarios.into_iter().filter(|s| !s.is_custom));
        stored.sort_by_key(|s| s.slot);
        Ok(())
    }

    async fn put_users(&self, users: Vec<UserRecord>) -> Result<()> {
        let mut stored = self.users.write().await;
        stored.retain(|u| !users.iter().any(|n| n.slot == u.slot));
        stored.extend(users);
        stored.sort_by_key(|u| u.slot);
        Ok(())
    }

    async fn put_status(&self, snapshot: StatusSnapshot) -> Result<()> {
        *self.status.write().await = Some(snapshot);
        Ok(())
    }

    async fn mark_configured(&self, configured: bool) -> Result<()> {
        *self.configured.write().await = configured;
        Ok(())
    }
}
