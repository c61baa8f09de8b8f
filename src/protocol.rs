// MIT License - Copyright (c) 2026 Peter Wright

use std::fmt;

use tracing::debug;

use crate::devices::scenario::ScenarioRecord;
use crate::devices::system::{PanelStatus, StatusReport, SystemBlock};
use crate::devices::user::{PermissionFlags, UserRecord};
use crate::devices::zone::{ZoneRecord, ZoneSet};

/// Name sentinel for a zone, scenario, or user slot that is not equipped.
pub const DISABLED_SENTINEL: &str = "NE";

/// Field separator inside response bodies.
pub const FIELD_SEP: char = '&';
/// Terminator of a complete message.
pub const TERM_FINAL: char = '#';
/// Terminator announcing a continuation message.
pub const TERM_CONTINUED: char = '&';

/// One step of the CONF1..CONF5 configuration download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfStep {
    /// Firmware version, option flags, zone table.
    Conf1,
    /// Scenarios, first half.
    Conf2,
    /// Scenarios, second half.
    Conf3,
    /// Users, first half (including the Joker user).
    Conf4,
    /// Users, second half.
    Conf5,
}

impl ConfStep {
    pub const ALL: [ConfStep; 5] = [
        ConfStep::Conf1,
        ConfStep::Conf2,
        ConfStep::Conf3,
        ConfStep::Conf4,
        ConfStep::Conf5,
    ];

    /// 1-based step number.
    pub fn number(self) -> u8 {
        match self {
            Self::Conf1 => 1,
            Self::Conf2 => 2,
            Self::Conf3 => 3,
            Self::Conf4 => 4,
            Self::Conf5 => 5,
        }
    }

    /// Download progress once this step has completed (20% per step).
    pub fn percent_complete(self) -> u8 {
        self.number() * 20
    }

    /// The response kind this step's query must be answered with.
    pub fn response_kind(self) -> ResponseKind {
        match self {
            Self::Conf1 => ResponseKind::Conf1,
            Self::Conf2 => ResponseKind::Conf2,
            Self::Conf3 => ResponseKind::Conf3,
            Self::Conf4 => ResponseKind::Conf4,
            Self::Conf5 => ResponseKind::Conf5,
        }
    }
}

/// Commands that can be sent to the panel.
///
/// Each variant renders to exactly one wire string; encoding is total
/// and deterministic. Argument ranges (zone 1..=8, scenario 1..=16,
/// user 1..=16) are validated by the caller before construction — the
/// codec does not re-validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CONFN?` — request configuration block N.
    ConfQuery { step: ConfStep },
    /// `SCE:SS` — arm a predefined scenario (2-digit zero-padded slot).
    ArmScenario { slot: u8 },
    /// `CUST:D` — arm an ad-hoc zone selection (ascending zone digits).
    ArmCustom { zones: ZoneSet },
    /// `SYS OFF` — disarm.
    Disarm,
    /// `SYS?` — query current status.
    StatusQuery,
    /// `SET:UNNPPPP` — update a user's permission bits.
    ///
    /// Defined by the wire table but not confirmed end-to-end against
    /// panel firmware; treat as provisional.
    SetUserPermissions {
        slot: u8,
        permissions: PermissionFlags,
    },
}

impl Command {
    /// Convert the command to its wire string representation.
    pub fn to_wire_string(&self) -> String {
        match self {
            Command::ConfQuery { step } => format!("CONF{}?", step.number()),
            Command::ArmScenario { slot } => format!("SCE:{:02}", slot),
            Command::ArmCustom { zones } => format!("CUST:{}", zones.digits()),
            Command::Disarm => "SYS OFF".to_string(),
            Command::StatusQuery => "SYS?".to_string(),
            Command::SetUserPermissions { slot, permissions } => {
                format!("SET:U{:02}{}", slot, permissions.to_bit_string())
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// Classification of an incoming SMS body.
///
/// Classification inspects only the leading characters against a fixed
/// ordered prefix list and always succeeds; it runs before [`decode`]
/// so callers can route by kind without decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Conf1,
    Conf2,
    Conf3,
    Conf4,
    Conf5,
    /// `OK:` command acknowledgment.
    Ack,
    /// `STATUS:` key-value report or the bare multi-line `SYS:` form.
    Status,
    /// `ERR:` explicit panel error.
    Error,
    /// No known prefix matched.
    Unrecognized,
}

/// Ordered prefix table; first match wins.
const PREFIXES: [(&str, ResponseKind); 10] = [
    ("CONF1:", ResponseKind::Conf1),
    ("CONF2:", ResponseKind::Conf2),
    ("CONF3:", ResponseKind::Conf3),
    ("CONF4:", ResponseKind::Conf4),
    ("CONF5:", ResponseKind::Conf5),
    ("OK:", ResponseKind::Ack),
    ("STATUS:", ResponseKind::Status),
    ("ERR:", ResponseKind::Error),
    ("SYS:", ResponseKind::Status),
    ("SYS :", ResponseKind::Status),
];

impl ResponseKind {
    /// Classify an SMS body by its leading characters.
    pub fn classify(text: &str) -> Self {
        for (prefix, kind) in PREFIXES {
            if text.starts_with(prefix) {
                return kind;
            }
        }
        Self::Unrecognized
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conf1 => "CONF1",
            Self::Conf2 => "CONF2",
            Self::Conf3 => "CONF3",
            Self::Conf4 => "CONF4",
            Self::Conf5 => "CONF5",
            Self::Ack => "OK",
            Self::Status => "STATUS",
            Self::Error => "ERR",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing terminator of a message body.
///
/// `&` announces a continuation message, but continuations are decoded
/// as-is and treated as final: the wire gives no way to pair the parts,
/// so reassembly is not attempted. The marker is recorded so callers
/// can at least see that a body was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Body ended with `#`.
    Final,
    /// Body ended with `&`; a continuation was announced but is not
    /// reassembled.
    Continued,
    /// No terminator present.
    Missing,
}

/// Command acknowledgment payload (`OK:status[:scenario]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckReport {
    pub status: PanelStatus,
    pub scenario: Option<String>,
}

/// Decoded response payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Conf1(SystemBlock),
    /// CONF2/CONF3 scenario tables.
    Scenarios(Vec<ScenarioRecord>),
    /// CONF4/CONF5 user tables.
    Users(Vec<UserRecord>),
    Ack(AckReport),
    Status(StatusReport),
    Error { code: String },
    Unrecognized { raw: String },
}

/// A decoded incoming message.
///
/// Carries no correlation token because the wire format provides none;
/// correlation is the exchange layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub kind: ResponseKind,
    pub termination: Termination,
    pub body: ResponseBody,
}

/// Decode an SMS body into a typed response.
///
/// Never fails: malformed sub-fields are skipped (logged at debug) and
/// the fields parsed so far are kept, since the dominant failure mode
/// is a panel speaking a slightly different dialect, not a corrupted
/// transport. A body with no recognized prefix decodes to
/// [`ResponseBody::Unrecognized`].
pub fn decode(text: &str) -> ParsedResponse {
    let kind = ResponseKind::classify(text);
    let (body_text, termination) = strip_terminator(text);

    let body = match kind {
        ResponseKind::Conf1 => ResponseBody::Conf1(decode_conf1(payload(body_text, "CONF1:"))),
        ResponseKind::Conf2 => {
            ResponseBody::Scenarios(decode_scenarios(payload(body_text, "CONF2:")))
        }
        ResponseKind::Conf3 => {
            ResponseBody::Scenarios(decode_scenarios(payload(body_text, "CONF3:")))
        }
        ResponseKind::Conf4 => ResponseBody::Users(decode_users(payload(body_text, "CONF4:"))),
        ResponseKind::Conf5 => ResponseBody::Users(decode_users(payload(body_text, "CONF5:"))),
        ResponseKind::Ack => ResponseBody::Ack(decode_ack(payload(body_text, "OK:"))),
        ResponseKind::Status => {
            if let Some(kv) = body_text.strip_prefix("STATUS:") {
                ResponseBody::Status(decode_status_fields(kv))
            } else {
                ResponseBody::Status(decode_status_lines(body_text))
            }
        }
        ResponseKind::Error => ResponseBody::Error {
            code: payload(body_text, "ERR:").trim().to_string(),
        },
        ResponseKind::Unrecognized => ResponseBody::Unrecognized {
            raw: text.to_string(),
        },
    };

    ParsedResponse {
        kind,
        termination,
        body,
    }
}

/// Strip one trailing terminator character, recording which it was.
fn strip_terminator(text: &str) -> (&str, Termination) {
    if let Some(stripped) = text.strip_suffix(TERM_FINAL) {
        (stripped, Termination::Final)
    } else if let Some(stripped) = text.strip_suffix(TERM_CONTINUED) {
        (stripped, Termination::Continued)
    } else {
        (text, Termination::Missing)
    }
}

fn payload<'a>(body: &'a str, prefix: &str) -> &'a str {
    body.strip_prefix(prefix).unwrap_or(body)
}

/// `name` → `Some(name)`, with empty and the `---` placeholder as none.
fn scenario_name(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s == "---" {
        None
    } else {
        Some(s.to_string())
    }
}

/// Whether a CONF1 field is the firmware version (`\d+.\d+`).
fn is_firmware_field(field: &str) -> bool {
    match field.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Decode the CONF1 body: `&`-joined fields holding the firmware
/// version, a `WORD.BBBB` option field, and `Zn=name` zones. Fields
/// matching none of these are ignored for forward compatibility.
fn decode_conf1(payload: &str) -> SystemBlock {
    let mut block = SystemBlock::default();
    for field in payload.split(FIELD_SEP).filter(|f| !f.is_empty()) {
        if is_firmware_field(field) {
            block.firmware = Some(field.to_string());
        } else if !field.contains('=') && field.contains('.') {
            if let Some((word, bits)) = field.split_once('.') {
                if word == "MAIN" {
                    block.is_main = true;
                }
                block.options = PermissionFlags::from_bit_string(bits);
            }
        } else if let Some((key, name)) = field.split_once('=') {
            match parse_slot(key, 'Z', 1..=8) {
                Some(slot) => block.zones.push(ZoneRecord::new(slot, name)),
                None => debug!(field, "ignoring unknown CONF1 field"),
            }
        } else {
            debug!(field, "ignoring unknown CONF1 field");
        }
    }
    block
}

/// Decode a CONF2/CONF3 body: `&`-joined `Snn=name` fields.
fn decode_scenarios(payload: &str) -> Vec<ScenarioRecord> {
    let mut scenarios = Vec::new();
    for field in payload.split(FIELD_SEP).filter(|f| !f.is_empty()) {
        match field
            .split_once('=')
            .and_then(|(key, name)| parse_slot(key, 'S', 1..=16).map(|slot| (slot, name)))
        {
            Some((slot, name)) => scenarios.push(ScenarioRecord::predefined(slot, name)),
            None => debug!(field, "skipping malformed scenario field"),
        }
    }
    scenarios
}

/// Decode a CONF4/CONF5 body: `&`-joined `RJO=name` (Joker, slot 0) and
/// `Rnn=name` fields.
fn decode_users(payload: &str) -> Vec<UserRecord> {
    let mut users = Vec::new();
    for field in payload.split(FIELD_SEP).filter(|f| !f.is_empty()) {
        let Some((key, name)) = field.split_once('=') else {
            debug!(field, "skipping malformed user field");
            continue;
        };
        if key == "RJO" {
            users.push(UserRecord::joker(name));
        } else {
            match parse_slot(key, 'R', 1..=16) {
                Some(slot) => users.push(UserRecord::regular(slot, name)),
                None => debug!(field, "skipping malformed user field"),
            }
        }
    }
    users
}

/// Parse a slot key like `Z1`, `S07`, `R16` into its number, requiring
/// the given prefix letter and range.
fn parse_slot(key: &str, prefix: char, range: std::ops::RangeInclusive<u8>) -> Option<u8> {
    key.strip_prefix(prefix)
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|slot| range.contains(slot))
}

/// Decode an `OK:` body: colon-joined status token and optional
/// scenario name.
fn decode_ack(payload: &str) -> AckReport {
    let mut parts = payload.splitn(2, ':');
    let status = PanelStatus::from_token(parts.next().unwrap_or_default());
    let scenario = parts.next().and_then(scenario_name);
    AckReport { status, scenario }
}

/// Decode a `STATUS:` body: `&`-joined `KEY=VALUE` pairs plus one bare
/// status token.
fn decode_status_fields(payload: &str) -> StatusReport {
    let mut report = StatusReport::default();
    for field in payload.split(FIELD_SEP).filter(|f| !f.is_empty()) {
        match field.split_once('=') {
            Some(("SCE", value)) => report.scenario = scenario_name(value),
            Some(("ZONES", value)) => report.zones_raw = Some(value.to_string()),
            Some(_) => debug!(field, "ignoring unknown STATUS field"),
            None => report.status = PanelStatus::from_token(field),
        }
    }
    report
}

/// Decode the bare multi-line status form: newline-separated
/// `KEY: value` lines. Only `SYS`, `SCE`, and `ZONES` are meaningful at
/// this layer; telemetry lines (mains power, battery, ...) are ignored.
fn decode_status_lines(body: &str) -> StatusReport {
    let mut report = StatusReport::default();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "SYS" => report.status = PanelStatus::from_token(value),
            "SCE" => report.scenario = scenario_name(value),
            "ZONES" => report.zones_raw = Some(value.trim().to_string()),
            _ => {}
        }
    }
    report
}
