//! Single-flight coordination for token refresh.
//!
//! At most one refresh exchange runs at a time. The first caller through
//! `join` becomes the leader; everyone else waits for the leader's outcome
//! instead of issuing their own refresh call. The waiter queue drains
//! exactly once, all-resolve or all-reject.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// Marker for a failed refresh delivered to waiters.
#[derive(Debug, Clone, Copy)]
pub struct RefreshFailed;

/// Outcome shared with every waiter: the new access token, or failure.
pub type RefreshOutcome = Result<String, RefreshFailed>;

/// Result of joining the flight.
pub enum Ticket {
    /// This caller must perform the refresh and then `settle`.
    Leader,
    /// Another refresh is in flight; await its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Default)]
pub struct SingleFlight {
    state: Mutex<FlightState>,
}

#[derive(Default)]
struct FlightState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the current refresh. The check-and-set happens synchronously
    /// under the lock — no await point — so exactly one concurrent caller
    /// becomes the leader.
    pub fn join(&self) -> Ticket {
        let mut state = self.state.lock().unwrap();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            Ticket::Follower(rx)
        } else {
            state.in_flight = true;
            Ticket::Leader
        }
    }

    /// Settle the in-flight refresh: clear the flag and wake every waiter
    /// with the same outcome.
    pub fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // A waiter that gave up (dropped its receiver) is fine to skip.
            let _ = waiter.send(outcome.clone());
        }
    }
}
