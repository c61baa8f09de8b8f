// MIT License - Copyright (c) 2026 Peter Wright

use bitflags::bitflags;

use crate::protocol::DISABLED_SENTINEL;

bitflags! {
    /// Per-user permission bits, 4 wide.
    ///
    /// On the wire these appear as four `0`/`1` characters read
    /// left-to-right (`FLAGS.BBBB` in CONF1, `PPPP` in `SET:U`):
    /// position 1 = RX1, 2 = RX2, 3 = VERIFY, 4 = CMD_ON_OFF.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PermissionFlags: u8 {
        /// May receive alarm reports on channel 1.
        const RX1        = 1 << 0;
        /// May receive alarm reports on channel 2.
        const RX2        = 1 << 1;
        /// May run verification calls.
        const VERIFY     = 1 << 2;
        /// May arm and disarm by command.
        const CMD_ON_OFF = 1 << 3;
    }
}

const PERMISSION_ORDER: [PermissionFlags; 4] = [
    PermissionFlags::RX1,
    PermissionFlags::RX2,
    PermissionFlags::VERIFY,
    PermissionFlags::CMD_ON_OFF,
];

impl PermissionFlags {
    /// Parse a left-to-right `0`/`1` string (`"1011"`). Missing or
    /// non-binary positions read as unset.
    pub fn from_bit_string(s: &str) -> Self {
        let mut flags = Self::empty();
        for (ch, flag) in s.chars().zip(PERMISSION_ORDER) {
            if ch == '1' {
                flags |= flag;
            }
        }
        flags
    }

    /// Render the 4-character wire form, the inverse of
    /// [`from_bit_string`](Self::from_bit_string).
    pub fn to_bit_string(&self) -> String {
        PERMISSION_ORDER
            .iter()
            .map(|flag| if self.contains(*flag) { '1' } else { '0' })
            .collect()
    }
}

/// A panel user, as downloaded by the CONF4/CONF5 blocks.
///
/// Slot 0 is the Joker user (wire prefix `RJO`), conceptually always
/// present; slots 1..=16 use `Rnn`. The download carries only the name;
/// permissions are edited locally and pushed with `SET:U`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// 0 for the Joker user, otherwise 1..=16.
    pub slot: u8,
    pub name: String,
    pub enabled: bool,
    pub permissions: PermissionFlags,
    pub is_joker: bool,
}

impl UserRecord {
    /// The distinguished Joker user (slot 0).
    pub fn joker(name: impl Into<String>) -> Self {
        let name = name.into();
        let enabled = name != DISABLED_SENTINEL;
        Self {
            slot: 0,
            name,
            enabled,
            permissions: PermissionFlags::empty(),
            is_joker: true,
        }
    }

    /// A regular user in slots 1..=16.
    pub fn regular(slot: u8, name: impl Into<String>) -> Self {
        let name = name.into();
        let enabled = name != DISABLED_SENTINEL;
        Self {
            slot,
            name,
            enabled,
            permissions: PermissionFlags::empty(),
            is_joker: false,
        }
    }
}
