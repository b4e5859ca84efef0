use serde::{Deserialize, Serialize};

use crate::Snowflake;

/// A guild as returned by `GET /users/@me/guilds`.
///
/// The full guild object carries far more than this; only the id is
/// needed to drive channel enumeration and pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
}
