// Message Gate
// Sits between the runtime and the sink for one run: tallies stages and
// stops forwarding once the session is released.

use crate::domain::StageTally;
use crate::port::MessageHandler;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Forwarding state and tally share one lock: once `close` returns, no
/// message is being forwarded and none will be.
pub struct MessageGate {
    inner: Arc<dyn MessageHandler>,
    state: Mutex<GateState>,
}

struct GateState {
    open: bool,
    tally: StageTally,
}

impl MessageGate {
    pub fn new(inner: Arc<dyn MessageHandler>) -> Self {
        Self {
            inner,
            state: Mutex::new(GateState {
                open: true,
                tally: StageTally::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stop forwarding; waits for an in-flight message, later ones are dropped
    pub fn close(&self) {
        self.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Snapshot of what has been observed so far
    pub fn tally(&self) -> StageTally {
        self.lock().tally.clone()
    }
}

impl MessageHandler for MessageGate {
    fn on_message(&self, raw: &str) {
        let mut state = self.lock();
        if !state.open {
            debug!("Dropping script message received after detach");
            return;
        }

        state.tally.record(raw);
        // Held across the sink call so close() cannot overtake it
        self.inner.on_message(raw);
    }
}
