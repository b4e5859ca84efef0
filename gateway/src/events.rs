use serde_json::Value;

/// Dispatch events the session loop surfaces to its caller. Only
/// `MESSAGE_CREATE` is in scope (§4.E) — every other dispatch type is
/// observed only insofar as it updates `last_sequence`, then dropped.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    MessageCreate(Value),
}
