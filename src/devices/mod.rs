// MIT License - Copyright (c) 2026 Peter Wright

pub mod scenario;
pub mod system;
pub mod user;
pub mod zone;

pub use scenario::{CUSTOM_SCENARIO_BASE, ScenarioRecord};
pub use system::{PanelStatus, StatusReport, StatusSnapshot, SystemBlock};
pub use user::{PermissionFlags, UserRecord};
pub use zone::{ZoneRecord, ZoneSet};
