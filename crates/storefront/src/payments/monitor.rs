//! Registry of running payment pollers.

use std::time::Duration;

use moka::future::Cache;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commerce::{PaymentRequest, PaymentStatusSource};
use crate::config::PaymentPollConfig;

use super::poller::{PaymentPoller, PollHandle};

/// Handles not looked at for this long are evicted, which cancels their
/// task if it is still running.
const HANDLE_IDLE: Duration = Duration::from_secs(10 * 60);

/// Process-wide set of pollers, keyed by payment request ID.
///
/// Every poller token is a child of the monitor's root token, so
/// [`PaymentMonitor::shutdown`] stops all of them.
#[derive(Clone)]
pub struct PaymentMonitor {
    pollers: Cache<String, PollHandle>,
    root: CancellationToken,
    config: PaymentPollConfig,
}

impl PaymentMonitor {
    #[must_use]
    pub fn new(config: PaymentPollConfig) -> Self {
        Self {
            pollers: Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(HANDLE_IDLE)
                .build(),
            root: CancellationToken::new(),
            config,
        }
    }

    /// Start polling `request`, replacing any poller for the same request.
    pub async fn start<S: PaymentStatusSource>(&self, source: S, request: PaymentRequest) -> PollHandle {
        let key = request.request_id.clone();
        if let Some(previous) = self.pollers.remove(&key).await {
            previous.cancel();
        }

        let handle = PaymentPoller::spawn(source, request, self.root.child_token(), self.config);
        self.pollers.insert(key, handle.clone()).await;
        handle
    }

    /// The poller for `request_id`, if it is still tracked.
    pub async fn get(&self, request_id: &str) -> Option<PollHandle> {
        self.pollers.get(request_id).await
    }

    /// Cancel and forget the poller for `request_id`.
    pub async fn stop(&self, request_id: &str) {
        if let Some(handle) = self.pollers.remove(request_id).await {
            handle.cancel();
        }
    }

    /// Cancel every poller. Called on graceful shutdown.
    pub fn shutdown(&self) {
        info!("Cancelling payment pollers");
        self.root.cancel();
    }
}
