//! Global channel liveness monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::channels::ChannelTable;

/// Start the fixed-interval liveness sweep over every open channel.
///
/// This is the sole mechanism for detecting network-level death of a
/// channel that never sent an explicit close.
pub fn spawn_heartbeat(channels: Arc<ChannelTable>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; channels get a full
        // interval before their first ping.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!(channels = channels.len(), "heartbeat sweep");
            channels.sweep();
        }
    })
}
