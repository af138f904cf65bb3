use async_trait::async_trait;
use crate::{Mention, PropType, ResearchError, StatContext};

/// Source of public commentary about a player
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// An empty list is a normal outcome; `Err` means the source itself failed.
    async fn scrape_mentions(&self, player_name: &str) -> Result<Vec<Mention>, ResearchError>;
}

/// Source of numeric season context for a player
#[async_trait]
pub trait StatContextSource: Send + Sync {
    async fn fetch_stat_context(
        &self,
        player_name: &str,
        prop_type: PropType,
    ) -> Result<StatContext, ResearchError>;
}
