//! Cyclic ID generation for pooled entities.

use parking_lot::Mutex;

/// Hands out sequential `u32` IDs, wrapping back to 0 after `u32::MAX`.
///
/// Each pool owns its own generator, so IDs are unique within a pool as long
/// as the pool size stays below the counter period.
#[derive(Debug, Default)]
pub struct IdGenerator {
    inner: Mutex<GeneratorState>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    sn: u32,
    // Set when the previous ID was u32::MAX; the next call restarts at 0.
    ended: bool,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u32 {
        let mut state = self.inner.lock();
        if state.ended {
            state.ended = false;
            state.sn = 0;
            return 0;
        }
        let id = state.sn;
        if id < u32::MAX {
            state.sn += 1;
        } else {
            state.ended = true;
        }
        id
    }
}
