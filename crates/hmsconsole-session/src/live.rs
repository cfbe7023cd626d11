//! Live view of one table.
//!
//! While a table is selected, its rows are re-fetched with
//! `SELECT * FROM <table>;` once per period. At most one subscription exists;
//! it lives in a [`LiveSlot`], and taking a new one releases the old one first.
//! Releasing aborts the poll task, and a poll only writes to the view while it
//! still is the active subscription, so a stale table never reaches the panel.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::render::{Presentation, ResultRenderer};
use crate::transport::QueryTransport;
use crate::view::{Panel, View};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

pub fn select_all(table: &str) -> String {
    format!("SELECT * FROM {};", table)
}

/// Handle to a running poller. Dropping it stops the poller.
#[derive(Debug)]
pub struct LiveSubscription {
    id: u64,
    table: String,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(table = %self.table, "Live updates stopped");
    }
}

#[derive(Debug, Default)]
struct SlotState {
    active: Option<LiveSubscription>,
    next_id: u64,
}

/// Holder of the single live subscription.
#[derive(Debug, Default)]
pub struct LiveSlot {
    inner: Arc<Mutex<SlotState>>,
}

/// What a poller needs besides its table name.
#[derive(Clone)]
pub struct LiveSink {
    pub transport: Arc<dyn QueryTransport>,
    pub view: Arc<dyn View>,
    pub renderer: Arc<dyn ResultRenderer>,
}

impl LiveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is active with a poller for `table`.
    /// Must be called inside a Tokio runtime. A zero period polls at [`DEFAULT_INTERVAL`].
    pub fn subscribe(&self, table: &str, period: Duration, sink: LiveSink) {
        let period = if period.is_zero() { DEFAULT_INTERVAL } else { period };
        let mut state = lock(&self.inner);
        drop(state.active.take());

        state.next_id += 1;
        let id = state.next_id;
        let task = tokio::spawn(poll(
            id,
            table.to_string(),
            period,
            sink,
            Arc::downgrade(&self.inner),
        ));
        debug!(table, ?period, "Live updates started");
        state.active = Some(LiveSubscription { id, table: table.to_string(), task });
    }

    /// Stop the active poller, returning the table it was watching.
    pub fn release(&self) -> Option<String> {
        let released = lock(&self.inner).active.take();
        released.map(|sub| sub.table.clone())
    }

    pub fn active_table(&self) -> Option<String> {
        lock(&self.inner).active.as_ref().map(|sub| sub.table.clone())
    }
}

fn lock(inner: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn poll(id: u64, table: String, period: Duration, sink: LiveSink, slot: Weak<Mutex<SlotState>>) {
    let query = select_all(&table);
    // First refresh one period after subscribing, then every period.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        trace!(%table, "Live poll");

        let content = match sink.transport.send(&query).await {
            Ok(reply) => sink.renderer.render(&reply),
            Err(e) => Presentation::Error(format!("Error: {}", e)),
        };

        let Some(inner) = slot.upgrade() else { break };
        let state = lock(&inner);
        // Checked under the lock `release` takes: once released, never written.
        if state.active.as_ref().map(|sub| sub.id) != Some(id) {
            break;
        }
        sink.view.show(Panel::Live, content);
    }
}
