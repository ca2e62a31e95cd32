//! The in-order item processing pipeline.
//!
//! Items flow through the processors in registration order, each processor
//! receiving the item its predecessor produced. With fail-fast set (the
//! scheduler always sets it) the first processor error aborts the remaining
//! steps for that item. Counters are atomic so the monitor can sample them
//! mid-flight.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::data::Item;

/// An item processor: transforms an item or rejects it with an error. On
/// error the pipeline keeps the item its predecessor produced.
pub type ProcessItem = Arc<dyn Fn(Item) -> Result<Item, anyhow::Error> + Send + Sync>;

pub struct ItemPipeline {
    processors: Vec<ProcessItem>,
    fail_fast: AtomicBool,
    sent: AtomicU64,
    accepted: AtomicU64,
    processed: AtomicU64,
    processing_number: AtomicU64,
}

// Decrements the in-flight counter on every exit path, including a
// processor panic unwinding through `send`.
struct ProcessingGuard<'a>(&'a AtomicU64);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ItemPipeline {
    pub fn new(processors: Vec<ProcessItem>) -> Self {
        ItemPipeline {
            processors,
            fail_fast: AtomicBool::new(false),
            sent: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            processing_number: AtomicU64::new(0),
        }
    }

    /// Runs one item through the processor chain, returning every error the
    /// chain produced.
    pub fn send(&self, item: Item) -> Vec<anyhow::Error> {
        self.processing_number.fetch_add(1, Ordering::SeqCst);
        let _guard = ProcessingGuard(&self.processing_number);
        self.sent.fetch_add(1, Ordering::SeqCst);

        self.accepted.fetch_add(1, Ordering::SeqCst);
        let mut errors = Vec::new();
        let mut current = item;
        for processor in &self.processors {
            match processor(current.clone()) {
                Ok(next) => current = next,
                Err(err) => {
                    errors.push(err);
                    if self.fail_fast() {
                        break;
                    }
                }
            }
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        errors
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::SeqCst)
    }

    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::SeqCst);
    }

    /// `[sent, accepted, processed]`.
    pub fn count(&self) -> [u64; 3] {
        [
            self.sent.load(Ordering::SeqCst),
            self.accepted.load(Ordering::SeqCst),
            self.processed.load(Ordering::SeqCst),
        ]
    }

    /// Number of items currently inside `send`.
    pub fn processing_number(&self) -> u64 {
        self.processing_number.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> String {
        let [sent, accepted, processed] = self.count();
        format!(
            "failFast: {}, processorNumber: {}, sent: {}, accepted: {}, processed: {}, processingNumber: {}",
            self.fail_fast(),
            self.processors.len(),
            sent,
            accepted,
            processed,
            self.processing_number(),
        )
    }
}

impl fmt::Debug for ItemPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemPipeline")
            .field("processors", &self.processors.len())
            .field("fail_fast", &self.fail_fast())
            .field("count", &self.count())
            .field("processing_number", &self.processing_number())
            .finish()
    }
}
