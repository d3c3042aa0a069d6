use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Chart,
    Qr,
}

/// Process-wide usage counters. Owned by `AppState` and passed
/// explicitly; the rendering pipeline itself stays free of hidden state.
#[derive(Default)]
pub struct Telemetry {
    chart_count: AtomicU64,
    qr_count: AtomicU64,
    reported: Mutex<HashMap<String, HashMap<Counter, u64>>>,
}

impl Telemetry {
    pub fn count_chart(&self) {
        self.chart_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_qr(&self) {
        self.qr_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chart_total(&self) -> u64 {
        self.chart_count.load(Ordering::Relaxed)
    }

    pub fn qr_total(&self) -> u64 {
        self.qr_count.load(Ordering::Relaxed)
    }

    /// Latest counter value reported by an external process; repeated
    /// reports from the same process replace the previous value.
    pub fn receive(&self, pid: &str, counter: Counter, value: u64) {
        self.reported
            .lock()
            .entry(pid.to_string())
            .or_default()
            .insert(counter, value);
    }

    pub fn reported_total(&self, counter: Counter) -> u64 {
        self.reported
            .lock()
            .values()
            .filter_map(|counters| counters.get(&counter))
            .sum()
    }
}
