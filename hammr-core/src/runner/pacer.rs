use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Shared pacing ticker. A single timer task grants one start slot per
/// period; workers claim slots before starting a call. At most one
/// unclaimed slot is outstanding at a time, so the global start rate
/// stays at or under the configured qps regardless of worker count.
#[derive(Debug, Default)]
pub(crate) struct Pacer {
    scheduled: AtomicU64,
    claimed: AtomicU64,
    notify: Notify,
}

impl Pacer {
    /// Called by the timer task once per period.
    pub(crate) fn tick(&self) {
        let claimed = self.claimed.load(Ordering::Relaxed);
        let scheduled = self.scheduled.load(Ordering::Relaxed);
        if scheduled == claimed {
            self.scheduled.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
    }

    /// Waits for and claims the next start slot.
    pub(crate) async fn claim(&self) {
        loop {
            let scheduled = self.scheduled.load(Ordering::Relaxed);
            let claimed = self.claimed.load(Ordering::Relaxed);

            if claimed < scheduled {
                if self
                    .claimed
                    .compare_exchange_weak(
                        claimed,
                        claimed + 1,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return;
                }
                continue;
            }

            self.notify.notified().await;
        }
    }
}
