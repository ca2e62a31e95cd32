//! The request cache: a closable FIFO staging area.
//!
//! Admitted requests wait here until the transfer loop finds room in the
//! request channel, so bursts of analyzer output never block the analyzers
//! themselves. Closing is terminal; a closed cache accepts and yields
//! nothing.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

use crate::data::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Open,
    Closed,
}

impl CacheStatus {
    fn name(self) -> &'static str {
        match self {
            CacheStatus::Open => "open",
            CacheStatus::Closed => "closed",
        }
    }
}

#[derive(Debug)]
pub(crate) struct RequestCache {
    inner: Mutex<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    queue: VecDeque<Request>,
    status: CacheStatus,
}

impl RequestCache {
    pub(crate) fn new() -> Self {
        RequestCache {
            inner: Mutex::new(CacheInner {
                queue: VecDeque::new(),
                status: CacheStatus::Open,
            }),
        }
    }

    /// Appends a request. Returns false once the cache is closed.
    pub(crate) fn put(&self, req: Request) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == CacheStatus::Closed {
            return false;
        }
        inner.queue.push_back(req);
        true
    }

    /// Removes and returns the oldest request, or `None` when the cache is
    /// empty or closed. Never blocks.
    pub(crate) fn get(&self) -> Option<Request> {
        let mut inner = self.inner.lock();
        if inner.status == CacheStatus::Closed {
            return None;
        }
        inner.queue.pop_front()
    }

    pub(crate) fn length(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.inner.lock().queue.capacity()
    }

    /// Terminal; there is no reopen.
    pub(crate) fn close(&self) {
        self.inner.lock().status = CacheStatus::Closed;
    }

    pub(crate) fn summary(&self) -> String {
        let inner = self.inner.lock();
        format!(
            "status: {}, length: {}, capacity: {}",
            inner.status.name(),
            inner.queue.len(),
            inner.queue.capacity(),
        )
    }
}

impl fmt::Display for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::new(
            reqwest::Request::new(Method::GET, Url::parse(url).unwrap()),
            0,
        )
    }

    #[test]
    fn requests_come_back_in_fifo_order() {
        let cache = RequestCache::new();
        assert!(cache.put(request("http://example.com/a")));
        assert!(cache.put(request("http://example.com/b")));
        assert!(cache.put(request("http://example.com/c")));
        assert_eq!(cache.length(), 3);

        assert_eq!(cache.get().unwrap().url().path(), "/a");
        assert_eq!(cache.get().unwrap().url().path(), "/b");
        assert_eq!(cache.get().unwrap().url().path(), "/c");
        assert!(cache.get().is_none());
    }

    #[test]
    fn closed_cache_accepts_and_yields_nothing() {
        let cache = RequestCache::new();
        cache.put(request("http://example.com/a"));
        cache.close();

        assert!(!cache.put(request("http://example.com/b")));
        assert!(cache.get().is_none());
        // Close is idempotent.
        cache.close();
        assert!(cache.summary().starts_with("status: closed"));
    }

    #[test]
    fn summary_reports_length_and_capacity() {
        let cache = RequestCache::new();
        cache.put(request("http://example.com/a"));
        let summary = cache.summary();
        assert!(summary.starts_with("status: open, length: 1"), "{summary}");
        assert!(cache.capacity() >= cache.length());
    }
}
