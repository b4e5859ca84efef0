use serde::{Deserialize, Serialize};

use crate::Snowflake;

/// Channel kind code as returned by the upstream channel-list endpoint.
///
/// Only text and announcement channels are eligible for backfill; every
/// other kind is ignored at the seeding step.
pub const CHANNEL_KIND_TEXT: u16 = 0;
pub const CHANNEL_KIND_ANNOUNCEMENT: u16 = 5;

/// A channel as returned by `GET /guilds/{guild_id}/channels`.
///
/// Only the fields needed to decide backfill eligibility are projected;
/// everything else upstream sends is dropped rather than modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiChannel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

impl ApiChannel {
    pub fn is_backfill_eligible(&self) -> bool {
        matches!(self.kind, CHANNEL_KIND_TEXT | CHANNEL_KIND_ANNOUNCEMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(kind: u16) -> ApiChannel {
        ApiChannel {
            id: "1".to_string(),
            kind,
            guild_id: None,
        }
    }

    #[test]
    fn text_and_announcement_are_eligible() {
        assert!(channel(CHANNEL_KIND_TEXT).is_backfill_eligible());
        assert!(channel(CHANNEL_KIND_ANNOUNCEMENT).is_backfill_eligible());
    }

    #[test]
    fn voice_and_category_are_not_eligible() {
        assert!(!channel(2).is_backfill_eligible());
        assert!(!channel(4).is_backfill_eligible());
        assert!(!channel(15).is_backfill_eligible());
    }
}
