//! Background TTL sweeper: periodically evicts sessions nobody has polled
//! in a while so the registry doesn't grow unbounded over process uptime.

use std::sync::Arc;
use std::time::Duration;

use super::SessionRegistry;

/// Spawns a task that calls [`SessionRegistry::sweep`] on `interval`,
/// removing any session whose last update is older than `ttl`. Runs for
/// the lifetime of the process; the handle is only useful for tests that
/// want to abort it early.
pub fn spawn_sweeper(registry: Arc<SessionRegistry>, interval: Duration, ttl: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.sweep(ttl).await;
            if removed > 0 {
                log::info!("session sweeper removed {removed} expired session(s)");
            }
        }
    })
}
