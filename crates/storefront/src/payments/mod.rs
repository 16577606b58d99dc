//! Payment confirmation.
//!
//! After an M-Pesa STK push the customer approves the payment on their
//! phone. [`PaymentPoller`] queries the status endpoint on a fixed schedule
//! until a terminal status or the deadline; [`PaymentMonitor`] keeps the
//! running pollers so later requests from the same visitor can read their
//! state.

mod monitor;
mod poller;

pub use monitor::PaymentMonitor;
pub use poller::{PaymentPoller, PollHandle, PollState};
