//! Payment Confirmation Poller.
//!
//! One task per STK push. It owns the tick schedule and the absolute
//! deadline, publishes its state on a watch channel and stops on the first
//! terminal status, on the deadline, or when its token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use lemu_core::{Money, PaymentStatus};
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::commerce::{PaymentRequest, PaymentStatusSource};
use crate::config::PaymentPollConfig;

/// State of one payment confirmation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PollState {
    /// Still waiting for a terminal status.
    Polling {
        ticks: u32,
        #[serde(rename = "elapsedMs", serialize_with = "as_millis")]
        elapsed: Duration,
    },
    /// The payment went through.
    Complete {
        amount: Option<Money>,
        request_id: String,
    },
    /// The payment was declined or cancelled by the customer.
    Failed { request_id: String, reason: String },
    /// No terminal status before the deadline.
    TimedOut { request_id: String },
    /// Polling was stopped from outside.
    Cancelled,
}

impl PollState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Polling { .. })
    }
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Handle to a running poller.
///
/// Clones share the task. When the last clone is dropped the task is
/// cancelled.
#[derive(Clone)]
pub struct PollHandle {
    request_id: Arc<str>,
    state: watch::Receiver<PollState>,
    cancel: CancellationToken,
    _guard: Arc<DropGuard>,
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("request_id", &self.request_id)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl PollHandle {
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Stop polling. The task publishes [`PollState::Cancelled`] unless it
    /// already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the poll reaches a terminal state.
    pub async fn finished(&self) -> PollState {
        let mut rx = self.state.clone();
        match rx.wait_for(PollState::is_terminal).await {
            Ok(state) => state.clone(),
            // Sender gone without a terminal state: the task was aborted.
            Err(_) => PollState::Cancelled,
        }
    }
}

/// Spawns payment confirmation pollers.
pub struct PaymentPoller;

impl PaymentPoller {
    /// Start polling `request` on its own task.
    ///
    /// The first status query happens one interval after the start. The
    /// deadline is measured from the start and wins over a tick due at the
    /// same instant.
    pub fn spawn<S: PaymentStatusSource>(
        source: S,
        request: PaymentRequest,
        cancel: CancellationToken,
        config: PaymentPollConfig,
    ) -> PollHandle {
        let (tx, rx) = watch::channel(PollState::Polling {
            ticks: 0,
            elapsed: Duration::ZERO,
        });
        let request_id: Arc<str> = Arc::from(request.request_id.as_str());
        let span = info_span!("payment_poll", request_id = %request.request_id);
        let token = cancel.clone();

        tokio::spawn(
            async move {
                let terminal = run(&source, &request, &token, config, &tx).await;
                info!(state = ?terminal, "Payment polling finished");
                tx.send_replace(terminal);
            }
            .instrument(span),
        );

        PollHandle {
            request_id,
            state: rx,
            _guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
        }
    }
}

async fn run<S: PaymentStatusSource>(
    source: &S,
    request: &PaymentRequest,
    cancel: &CancellationToken,
    config: PaymentPollConfig,
    tx: &watch::Sender<PollState>,
) -> PollState {
    let start = Instant::now();
    let deadline = tokio::time::sleep_until(start + config.deadline);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval_at(start + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    let timed_out = || PollState::TimedOut {
        request_id: request.request_id.clone(),
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return PollState::Cancelled,
            () = &mut deadline => return timed_out(),
            _ = ticker.tick() => {}
        }

        ticks += 1;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return PollState::Cancelled,
            () = &mut deadline => return timed_out(),
            result = source.payment_status(request) => result,
        };

        match result {
            Ok(response) => match response.status {
                PaymentStatus::Complete => {
                    return PollState::Complete {
                        amount: response.amount,
                        request_id: request.request_id.clone(),
                    };
                }
                PaymentStatus::Failed => {
                    return PollState::Failed {
                        request_id: request.request_id.clone(),
                        reason: response
                            .message
                            .unwrap_or_else(|| "Payment was not completed".to_string()),
                    };
                }
                PaymentStatus::Pending => debug!(ticks, "Payment still pending"),
            },
            Err(e) => warn!(error = %e, ticks, "Payment status query failed"),
        }

        tx.send_replace(PollState::Polling {
            ticks,
            elapsed: start.elapsed(),
        });
    }
}
