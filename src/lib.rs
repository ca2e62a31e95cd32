//! # crawl-core
//!
//! Core engine of a depth-bounded, same-site concurrent web crawler.
//!
//! The engine is built around a [`Scheduler`] that owns four bounded
//! channels (requests, responses, items, errors), a pool of page
//! downloaders, a pool of response analyzers, an in-order item pipeline, a
//! FIFO request cache, and a URL-seen set. The embedder supplies the HTTP
//! client factory, the response parsers, the item processors and the seed
//! request; the companion [`monitoring`](monitor::monitoring) watchdog
//! drains the error channel and stops the crawl once it goes quiescent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use crawl_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scheduler = Arc::new(Scheduler::new());
//!     let record: Record = Arc::new(|level, content| println!("[{level}] {content}"));
//!     let check_count_rx = monitoring(
//!         Arc::clone(&scheduler),
//!         Duration::from_millis(10),
//!         1000,
//!         true,
//!         false,
//!         record,
//!     );
//!
//!     let parser: ParseResponse = Arc::new(|resp, _depth| {
//!         // extract follow-up requests and items from resp.body()
//!         (Vec::new(), Vec::new())
//!     });
//!     let processor: ProcessItem = Arc::new(|item| Ok(item));
//!
//!     scheduler
//!         .start(
//!             ChannelArgs::new(10, 10, 10, 10),
//!             PoolArgs::new(3, 3),
//!             1,
//!             Arc::new(reqwest::Client::new),
//!             vec![parser],
//!             vec![processor],
//!             reqwest::Request::new(reqwest::Method::GET, "http://example.com/".parse()?),
//!         )
//!         .await?;
//!
//!     let checks = check_count_rx.recv().await?;
//!     println!("crawl finished after {checks} idle checks");
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod args;
pub mod chanman;
pub mod data;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod ids;
pub mod monitor;
pub mod pipeline;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod stopsign;

pub use analyzer::{new_analyzer_pool, Analyzer, ParseResponse};
pub use args::{ChannelArgs, PoolArgs};
pub use chanman::{ChannelManager, ChannelManagerStatus};
pub use data::{Data, Item, Request, Response};
pub use domain::primary_domain;
pub use downloader::{new_downloader_pool, GenHttpClient, PageDownloader};
pub use error::{CrawlerError, ErrorKind};
pub use ids::IdGenerator;
pub use monitor::{monitoring, Record};
pub use pipeline::{ItemPipeline, ProcessItem};
pub use pool::{Entity, EntityPool, PoolError};
pub use scheduler::{SchedSummary, Scheduler};
pub use stopsign::StopSign;
