//! In-flight work accounting
//!
//! Every URL handed to the Fetcher stage is paired with a [`Ticket`]. The
//! ticket is cloned into each message derived from that URL (the parsed page,
//! every discovered link, the extracted article) and the URL only stops
//! counting as in flight once the last clone is dropped, i.e. after its links
//! have been enqueued and its article upserted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    count: AtomicUsize,
    idle: Notify,
}

/// Counter of dispatched URLs whose derived work is not finished
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    shared: Arc<Shared>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more unit of in-flight work
    pub fn ticket(&self) -> Ticket {
        self.shared.count.fetch_add(1, Ordering::AcqRel);
        Ticket {
            guard: Arc::new(TicketGuard {
                shared: Arc::clone(&self.shared),
            }),
        }
    }

    pub fn count(&self) -> usize {
        self.shared.count.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }

    /// Wait until no work is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Shared handle on one unit of in-flight work
#[derive(Debug, Clone)]
pub struct Ticket {
    guard: Arc<TicketGuard>,
}

impl Ticket {
    /// Number of live clones of this ticket
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.guard)
    }
}

#[derive(Debug)]
struct TicketGuard {
    shared: Arc<Shared>,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if self.shared.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.idle.notify_waiters();
        }
    }
}
