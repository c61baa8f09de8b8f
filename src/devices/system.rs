// MIT License - Copyright (c) 2026 Peter Wright

use chrono::{DateTime, Utc};

use crate::devices::user::PermissionFlags;
use crate::devices::zone::ZoneRecord;

/// Overall arming state of the panel.
///
/// The wire does not publish its status vocabulary; parsing accepts the
/// observed tokens and keeps anything else as [`Unknown`](Self::Unknown)
/// rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelStatus {
    Disarmed,
    Armed,
    Alarm,
    Tamper,
    #[default]
    Unknown,
}

impl PanelStatus {
    /// Map a status token (`ON`, `OFF`, `ARMED`, free text containing
    /// `ALARM`/`TAMPER`, ...) to a status.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        match token {
            "ON" | "ARMED" => Self::Armed,
            "OFF" | "DISARMED" => Self::Disarmed,
            _ if token.contains("ALARM") => Self::Alarm,
            _ if token.contains("TAMPER") => Self::Tamper,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Armed => "armed",
            Self::Alarm => "alarm",
            Self::Tamper => "tamper",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed)
    }
}

impl std::fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded status reply (`STATUS:` key-value form or the bare
/// multi-line `SYS:` form).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub status: PanelStatus,
    /// Active scenario name; `---` and empty mean none.
    pub scenario: Option<String>,
    /// Raw active-zone text (e.g. `1,2,3`), verbatim from the panel.
    pub zones_raw: Option<String>,
}

/// What the record store keeps as the last known panel state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: PanelStatus,
    pub scenario: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn now(status: PanelStatus, scenario: Option<String>) -> Self {
        Self {
            status,
            scenario,
            received_at: Utc::now(),
        }
    }
}

/// The CONF1 block: firmware version, account role, option flags, and
/// the zone table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemBlock {
    /// Firmware version string (`3.2`), when the panel reports one.
    pub firmware: Option<String>,
    /// Whether this handset is the panel's main account.
    pub is_main: bool,
    /// Option flags from the `FLAGS.BBBB` field.
    pub options: PermissionFlags,
    pub zones: Vec<ZoneRecord>,
}
