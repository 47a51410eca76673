//! Single-threaded event loop of one awake window.
//!
//! Radio events arrive on a `crossbeam-channel` receiver; the loop blocks in
//! `recv_timeout` until the next timer deadline and then polls the node.
//! Dropping every sender ends the window early.

use crossbeam_channel::{Receiver, RecvTimeoutError};

use blescale_traits::{Clock, RadioEvent};

use crate::duty_cycle::SleepRequest;
use crate::error::Result;
use crate::node::{Node, NodeStatus};

/// Run until the awake window closes; returns how long to sleep.
pub fn run_awake_window<C: Clock + ?Sized>(
    node: &mut Node,
    events: &Receiver<RadioEvent>,
    clock: &C,
) -> Result<SleepRequest> {
    if !node.is_started() {
        node.start(clock.now())?;
    }

    loop {
        let now = clock.now();
        let next_deadline = match node.poll(now) {
            NodeStatus::SleepDue(request) => {
                tracing::info!(sleep_ms = request.duration.as_millis(), "awake window over");
                return Ok(request);
            }
            NodeStatus::Awake { next_deadline } => next_deadline,
        };

        match events.recv_timeout(next_deadline.saturating_duration_since(now)) {
            Ok(event) => {
                node.handle_radio_event(event, clock.now());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("event source closed; ending awake window early");
                return Ok(node.sleep_request());
            }
        }
    }
}
