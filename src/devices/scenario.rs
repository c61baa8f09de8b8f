// MIT License - Copyright (c) 2026 Peter Wright

use crate::devices::zone::ZoneSet;
use crate::protocol::DISABLED_SENTINEL;

/// Slots at or above this value hold locally created custom scenarios.
/// The panel only ever reports predefined scenarios (slots 1..=16); the
/// configuration download never touches custom slots.
pub const CUSTOM_SCENARIO_BASE: u8 = 100;

/// A named set of zones armed together.
///
/// Predefined scenarios come from the panel's CONF2/CONF3 blocks and
/// carry no zone composition on the wire (the panel executes them by
/// slot). Custom scenarios are created locally, carry an explicit
/// [`ZoneSet`], and arm via the `CUST:` command instead of `SCE:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub slot: u8,
    pub name: String,
    pub enabled: bool,
    pub zones: ZoneSet,
    pub is_custom: bool,
}

impl ScenarioRecord {
    /// A panel-defined scenario from a `Snn=name` field.
    pub fn predefined(slot: u8, name: impl Into<String>) -> Self {
        let name = name.into();
        let enabled = name != DISABLED_SENTINEL;
        Self {
            slot,
            name,
            enabled,
            zones: ZoneSet::empty(),
            is_custom: false,
        }
    }

    /// A locally created custom scenario. `index` is the caller's own
    /// numbering; the stored slot is offset past the panel's range.
    pub fn custom(index: u8, name: impl Into<String>, zones: ZoneSet) -> Self {
        Self {
            slot: CUSTOM_SCENARIO_BASE + index,
            name: name.into(),
            enabled: true,
            zones,
            is_custom: true,
        }
    }
}
