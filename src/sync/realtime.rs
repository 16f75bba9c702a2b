use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::BoardSync;
use crate::store::ChangeFeed;

/// Spawn a background task feeding every store notification through the merge
/// policy. Ends when the store goes away; abort the handle to stop it earlier.
pub fn spawn_realtime_listener(sync: Arc<BoardSync>, mut feed: ChangeFeed) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = feed.next().await {
            sync.handle_change(item).await;
        }
        debug!(owner = %feed.owner(), "change feed closed");
    })
}
