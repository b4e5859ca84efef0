use serde::{Deserialize, Serialize};

use crate::user::ApiUser;
use crate::Snowflake;

/// Enumerates which ingestion path first observed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Live,
    Backfill,
}

impl MessageSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Backfill => "backfill",
        }
    }
}

/// The minimal author projection the normalizer attaches to a message.
/// Built from an [`ApiUser`] parsed off `message.author`: a missing
/// `username`/`global_name` defaults to `None`, but an absent or
/// wrong-typed `author`/`author.id` drops the whole projection rather
/// than yielding a partially-populated one (§4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
}

impl From<ApiUser> for MessageAuthor {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            global_name: user.global_name,
        }
    }
}
