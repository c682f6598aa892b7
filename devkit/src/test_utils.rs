/*!
Helpers de tests partagés par les suites du client de notifications

- Initialisation du logging selon `RUST_LOG`
- Attentes actives sur le travail des tâches de fond
*/

use crate::mock_server::MockNotifyServer;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Route `tracing` output to the test writer. Safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses. Returns whether it
/// held.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until `server` has received at least `count` requests on `path`.
pub async fn wait_for_requests(server: &MockNotifyServer, path: &str, count: usize, timeout: Duration) -> bool {
    wait_until(timeout, move || async move { server.count(path) >= count }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_until() {
        init_test_logging();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let held = wait_until(Duration::from_secs(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await;
        assert!(held);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        assert!(!wait_until(Duration::from_millis(50), || async { false }).await);
    }
}
