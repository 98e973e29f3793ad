use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use super::task::TaskHandle;

/// Start emitting heartbeats every `period` by invoking `tick`.
///
/// The first tick fires one full `period` after start. Returns `None` when
/// `period` is zero, which disables the heartbeat. The heartbeat stops when the
/// returned handle is dropped or when `tick` returns `false`.
///
/// No reply deadline is enforced here: a missing `pong` does not end the
/// connection on its own.
pub(crate) fn start<F>(period: Duration, tick: F) -> Option<TaskHandle>
where
    F: Fn() -> bool + Send + 'static,
{
    if period.is_zero() {
        return None;
    }

    Some(TaskHandle::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !tick() {
                break;
            }
        }
    }))
}
