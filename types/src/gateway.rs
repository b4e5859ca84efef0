use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Gateway opcodes. Only the subset the indexer's session loop consumes
/// or sends is modeled — presence, voice, and request-guild-members are
/// out of scope (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum GatewayOpcode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    Reconnect = 7,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

/// `HELLO` (op 10) payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHelloData {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// `IDENTIFY` (op 2) payload. No `session_id`/`seq` resume fields —
/// the session always identifies cold (§4.E, §9). `intents` is a raw
/// bitmask, not a `bitflags` type: the teacher's own
/// `GatewayIdentifyData`/`ShardOptions` keep intents as `u64` even though
/// `bitflags` models every other upstream bitmask (`Permissions`,
/// `MessageFlags`, …), so this follows that same precedent rather than
/// introducing a flags type the teacher deliberately didn't use here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIdentifyData {
    pub token: String,
    pub intents: u64,
    pub properties: GatewayIdentifyProperties,
}

/// Outbound envelope shared by `IDENTIFY` and `HEARTBEAT` frames.
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySendPayload<T> {
    pub op: GatewayOpcode,
    pub d: T,
}

/// Raw inbound gateway frame. `d` is left as [`serde_json::Value`] since
/// its shape depends on `op`/`t` and dispatch payloads are forwarded to
/// the normalizer verbatim (§4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReceivePayload {
    pub op: GatewayOpcode,
    #[serde(default)]
    pub d: Option<serde_json::Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

/// Default gateway intents: GUILDS(1) | GUILD_MESSAGES(512) | DIRECT_MESSAGES(4096).
pub const DEFAULT_INTENTS: u64 = 1 | 512 | 4096;
