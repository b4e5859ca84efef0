use serde::{Deserialize, Serialize};

use crate::Snowflake;

/// The author subset of a message payload.
///
/// Every field is read tolerantly: upstream occasionally omits
/// `global_name`, and webhook/system messages can omit fields entirely,
/// so the normalizer treats a missing or unreadable author as `None`
/// rather than rejecting the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
}
