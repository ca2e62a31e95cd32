//! The one-shot stop latch used for cooperative shutdown.
//!
//! Once signed, every send path in the scheduler checks the latch before
//! enqueuing and acknowledges with its component code instead. The per-code
//! counters exist for observability only; shutdown correctness never depends
//! on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct StopSign {
    signed: AtomicBool,
    deal_counts: Mutex<HashMap<String, u32>>,
}

impl StopSign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the latch. Returns false if it was already raised.
    pub fn sign(&self) -> bool {
        !self.signed.swap(true, Ordering::SeqCst)
    }

    /// Lock-free read; a slightly stale answer is tolerated by all callers.
    pub fn signed(&self) -> bool {
        self.signed.load(Ordering::SeqCst)
    }

    /// Records that the component identified by `code` observed the stop.
    /// Ignored while the latch is down, so counters only ever reflect
    /// acknowledgements that happened after the stop.
    pub fn deal(&self, code: &str) {
        if !self.signed() {
            return;
        }
        let mut counts = self.deal_counts.lock();
        *counts.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Lowers the latch and clears every acknowledgement counter.
    pub fn reset(&self) {
        let mut counts = self.deal_counts.lock();
        self.signed.store(false, Ordering::SeqCst);
        counts.clear();
    }

    pub fn deal_count(&self, code: &str) -> u32 {
        self.deal_counts.lock().get(code).copied().unwrap_or(0)
    }

    pub fn deal_total(&self) -> u32 {
        self.deal_counts.lock().values().sum()
    }

    pub fn summary(&self) -> String {
        if !self.signed() {
            return "signed: false".to_string();
        }
        let counts = self.deal_counts.lock();
        let mut entries: Vec<_> = counts.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let detail = entries
            .iter()
            .map(|(code, count)| format!("{code}:{count}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("signed: true, dealCount: {{{detail}}}")
    }
}
