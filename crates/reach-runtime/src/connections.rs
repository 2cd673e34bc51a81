//! Start-up wait for a set of remote endpoints.

use std::time::Duration;

use futures_util::future::join_all;
use reach_middleware::Connection;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Poll rate of [`wait_for_connections`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Bound of each individual probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(10);

/// Wait until every connection in `probes` answers, or `timeout` elapses.
///
/// Connections are dropped from the pending set as soon as they answer.
/// Returns `false` and logs every endpoint still missing on timeout.
pub async fn wait_for_connections(probes: Vec<Box<dyn Connection>>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut pending = probes;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let answers = join_all(pending.iter().map(|c| c.wait_for_server(PROBE_TIMEOUT))).await;
        let mut still_pending = Vec::with_capacity(pending.len());
        for (connection, connected) in pending.into_iter().zip(answers) {
            if connected {
                info!(endpoint = %connection.name(), "connected");
            } else {
                still_pending.push(connection);
            }
        }
        pending = still_pending;

        if pending.is_empty() {
            return true;
        }
        if Instant::now() >= deadline {
            for connection in &pending {
                error!(endpoint = %connection.name(), "connection timed out");
            }
            return false;
        }
        debug!(pending = pending.len(), "waiting for connections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach_hal::SimActionServer;
    use reach_middleware::EndpointProbe;

    #[tokio::test]
    async fn all_present_returns_true_at_once() {
        let a = SimActionServer::<u8>::new("/a");
        let b = SimActionServer::<String>::new("/b");
        let probes: Vec<Box<dyn Connection>> = vec![Box::new(EndpointProbe(a)), Box::new(EndpointProbe(b))];

        let started = Instant::now();
        assert!(wait_for_connections(probes, Duration::from_secs(1)).await);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn late_endpoint_is_picked_up() {
        let a = SimActionServer::<u8>::new("/late");
        a.set_available(false);
        let probes: Vec<Box<dyn Connection>> = vec![Box::new(EndpointProbe(a.clone()))];

        let wakeup = {
            let a = a.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                a.set_available(true);
            })
        };
        assert!(wait_for_connections(probes, Duration::from_secs(2)).await);
        wakeup.await.unwrap();
    }

    #[tokio::test]
    async fn missing_endpoint_times_out() {
        let a = SimActionServer::<u8>::new("/missing");
        a.set_available(false);
        let probes: Vec<Box<dyn Connection>> = vec![Box::new(EndpointProbe(a))];

        let started = Instant::now();
        assert!(!wait_for_connections(probes, Duration::from_millis(150)).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_secs(1));
    }
}
