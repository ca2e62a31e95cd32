//! The crawl error taxonomy.
//!
//! Every runtime failure that reaches the error channel is wrapped in a
//! [`CrawlerError`] tagging the stage that produced it. Validation failures
//! at `start` stay synchronous `anyhow` errors and never take this form.

use std::fmt;

use thiserror::Error;

/// The stage of the crawl a [`CrawlerError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Downloader,
    Analyzer,
    ItemProcessor,
    /// Internal scheduler failures, e.g. pool misuse surfaced mid-flight.
    Scheduler,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::Downloader => "Downloader Error",
            ErrorKind::Analyzer => "Analyzer Error",
            ErrorKind::ItemProcessor => "Item Processor Error",
            ErrorKind::Scheduler => "Scheduler Error",
        };
        f.write_str(tag)
    }
}

/// An error produced by one of the crawl stages, as delivered on the error
/// channel and drained by the monitor.
#[derive(Debug, Clone, Error)]
#[error("Crawler Error: {kind}: {msg}\n")]
pub struct CrawlerError {
    kind: ErrorKind,
    msg: String,
}

impl CrawlerError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        CrawlerError {
            kind,
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_kind_tag_and_trailing_newline() {
        let err = CrawlerError::new(ErrorKind::Downloader, "connection refused");
        assert_eq!(
            err.to_string(),
            "Crawler Error: Downloader Error: connection refused\n"
        );
    }

    #[test]
    fn kind_tags_match_their_stage() {
        assert_eq!(ErrorKind::Analyzer.to_string(), "Analyzer Error");
        assert_eq!(ErrorKind::ItemProcessor.to_string(), "Item Processor Error");
    }

    #[test]
    fn accessors_expose_parts() {
        let err = CrawlerError::new(ErrorKind::Analyzer, "bad parse");
        assert_eq!(err.kind(), ErrorKind::Analyzer);
        assert_eq!(err.msg(), "bad parse");
    }
}
