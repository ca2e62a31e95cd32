//! A "prelude" for embedders of the `crawl-core` crate.
//!
//! Re-exports the types needed to configure, start, and monitor a crawl.
//!
//! # Example
//!
//! ```
//! use crawl_core::prelude::*;
//! ```

pub use crate::{
    // Core types
    Scheduler,
    monitoring,
    // Startup arguments
    ChannelArgs,
    PoolArgs,
    // Embedder-supplied callables
    GenHttpClient,
    ParseResponse,
    ProcessItem,
    Record,
    // Data flowing through the crawl
    Data,
    Item,
    Request,
    Response,
    // Errors
    CrawlerError,
    ErrorKind,
};
