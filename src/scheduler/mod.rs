//! The crawl scheduler: the concurrency orchestrator of the engine.
//!
//! The scheduler owns the channel manager, both worker pools, the item
//! pipeline, the stop sign, the request cache and the URL-seen set. Four
//! long-lived tasks drive the crawl:
//!
//! - the *downloading loop* drains the request channel and runs one
//!   downloader worker per request,
//! - the *analyzing loop* drains the response channel and runs one analyzer
//!   worker per response,
//! - the *item loop* drains the item channel and runs the pipeline per item,
//! - the *transfer loop* periodically moves cached requests into the request
//!   channel, bounded by the channel's free capacity.
//!
//! New requests coming out of analyzers pass the admission filter (http
//! scheme, unseen URL, seed's primary domain, depth bound) before entering
//! the cache. Shutdown is cooperative: `stop` raises the stop sign, closes
//! the channels and the cache, and every send path acknowledges the sign
//! instead of enqueuing from then on.

mod cache;
mod summary;

pub use summary::SchedSummary;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use dashmap::DashSet;
use kanal::AsyncReceiver;
use parking_lot::RwLock;
use tracing::{error, trace, warn};

use crate::analyzer::{new_analyzer_pool, Analyzer, ParseResponse};
use crate::args::{ChannelArgs, PoolArgs};
use crate::chanman::ChannelManager;
use crate::data::{Data, Request, Response};
use crate::domain::primary_domain;
use crate::downloader::{new_downloader_pool, GenHttpClient, PageDownloader};
use crate::error::{CrawlerError, ErrorKind};
use crate::pipeline::{ItemPipeline, ProcessItem};
use crate::pool::Entity;
use crate::pool::EntityPool;
use crate::stopsign::StopSign;

use cache::RequestCache;

pub const DOWNLOADER_CODE: &str = "downloader";
pub const ANALYZER_CODE: &str = "analyzer";
pub const ITEM_PIPELINE_CODE: &str = "item_pipeline";
pub const SCHEDULER_CODE: &str = "scheduler";

const RUNNING_NEVER_STARTED: u32 = 0;
const RUNNING_STARTED: u32 = 1;
const RUNNING_STOPPED: u32 = 2;

// Tick of the transfer loop.
const TRANSFER_INTERVAL: Duration = Duration::from_millis(10);

/// Splits a component code into its role and ID parts:
/// `"downloader-7"` -> `("downloader", "7")`, `"scheduler"` -> `("scheduler", "")`.
pub fn parse_code(code: &str) -> (&str, &str) {
    match code.split_once('-') {
        Some((role, id)) => (role, id),
        None => (code, ""),
    }
}

fn generate_code(role: &str, id: u32) -> String {
    format!("{role}-{id}")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The crawl orchestrator. See the module docs for the task layout.
#[derive(Default)]
pub struct Scheduler {
    running: AtomicU32,
    inner: RwLock<Option<Arc<SchedulerInner>>>,
}

struct SchedulerInner {
    channel_args: ChannelArgs,
    pool_args: PoolArgs,
    crawl_depth: u32,
    primary_domain: String,
    chanman: ChannelManager,
    stop_sign: Arc<StopSign>,
    dl_pool: EntityPool<PageDownloader>,
    analyzer_pool: EntityPool<Analyzer>,
    item_pipeline: ItemPipeline,
    req_cache: RequestCache,
    url_set: DashSet<String>,
    dropped_errors: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every component, launches the four crawl loops, and seeds the
    /// cache with the first request at depth 0.
    ///
    /// All validation failures come back synchronously as `Err`, and a failed
    /// start leaves the scheduler startable again. Starting while a run is
    /// live is an error.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        &self,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        crawl_depth: u32,
        gen_http_client: GenHttpClient,
        parsers: Vec<ParseResponse>,
        processors: Vec<ProcessItem>,
        seed_http_req: reqwest::Request,
    ) -> Result<()> {
        let claimed = self
            .running
            .compare_exchange(
                RUNNING_NEVER_STARTED,
                RUNNING_STARTED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
            || self
                .running
                .compare_exchange(
                    RUNNING_STOPPED,
                    RUNNING_STARTED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok();
        if !claimed {
            bail!("the scheduler has been started");
        }

        match self.try_start(
            channel_args,
            pool_args,
            crawl_depth,
            gen_http_client,
            parsers,
            processors,
            seed_http_req,
        ) {
            Ok(()) => Ok(()),
            Err(err) => {
                // Leave the scheduler startable after a rejected start.
                self.running.store(RUNNING_NEVER_STARTED, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_start(
        &self,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        crawl_depth: u32,
        gen_http_client: GenHttpClient,
        parsers: Vec<ParseResponse>,
        processors: Vec<ProcessItem>,
        seed_http_req: reqwest::Request,
    ) -> Result<()> {
        channel_args.check()?;
        pool_args.check()?;

        let chanman = ChannelManager::new(channel_args)?;
        let dl_pool = new_downloader_pool(pool_args.page_downloader_pool_size(), gen_http_client)
            .map_err(|err| anyhow!("occur error when get page downloader pool: {err}"))?;
        let analyzer_pool = new_analyzer_pool(pool_args.analyzer_pool_size())
            .map_err(|err| anyhow!("occur error when get analyzer pool: {err}"))?;

        if processors.is_empty() {
            bail!("the item processor list is invalid");
        }
        let item_pipeline = ItemPipeline::new(processors);
        item_pipeline.set_fail_fast(true);

        let seed_host = seed_http_req
            .url()
            .host_str()
            .unwrap_or_default()
            .to_string();
        let primary = primary_domain(&seed_host)?;

        let stop_sign = {
            let previous = self.inner.read().as_ref().map(|inner| Arc::clone(&inner.stop_sign));
            match previous {
                Some(sign) => {
                    sign.reset();
                    sign
                }
                None => Arc::new(StopSign::new()),
            }
        };

        let inner = Arc::new(SchedulerInner {
            channel_args,
            pool_args,
            crawl_depth,
            primary_domain: primary,
            chanman,
            stop_sign,
            dl_pool,
            analyzer_pool,
            item_pipeline,
            req_cache: RequestCache::new(),
            url_set: DashSet::new(),
            dropped_errors: AtomicU64::new(0),
        });
        *self.inner.write() = Some(Arc::clone(&inner));

        inner.start_downloading();
        inner.activate_analyzers(Arc::new(parsers));
        inner.open_item_pipeline();
        inner.schedule(TRANSFER_INTERVAL);

        let seed = Request::new(seed_http_req, 0);
        if !inner.save_req_to_cache(seed, SCHEDULER_CODE) {
            warn!("the first request was not admitted to the cache");
        }
        Ok(())
    }

    /// Raises the stop sign, closes the channels and the cache. Only valid
    /// while running; a second call returns false.
    pub fn stop(&self) -> bool {
        if self
            .running
            .compare_exchange(
                RUNNING_STARTED,
                RUNNING_STOPPED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }
        if let Some(inner) = self.inner.read().clone() {
            inner.stop_sign.sign();
            inner.chanman.close();
            inner.req_cache.close();
        }
        true
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst) == RUNNING_STARTED
    }

    /// The consumer side of the error channel, or `None` unless the channel
    /// manager is initialized.
    pub fn error_chan(&self) -> Option<AsyncReceiver<CrawlerError>> {
        let inner = self.inner.read().clone()?;
        inner.chanman.error_chan().ok().map(|(_tx, rx)| rx)
    }

    /// True iff both pools are fully returned and the pipeline has no item in
    /// flight.
    pub fn idle(&self) -> bool {
        match self.inner.read().clone() {
            Some(inner) => {
                inner.dl_pool.used() == 0
                    && inner.analyzer_pool.used() == 0
                    && inner.item_pipeline.processing_number() == 0
            }
            None => false,
        }
    }

    /// Snapshot of the scheduler's observable state, or `None` before the
    /// first start.
    pub fn summary(&self, prefix: &str) -> Option<SchedSummary> {
        let inner = self.inner.read().clone()?;
        let urls: Vec<String> = inner.url_set.iter().map(|url| url.key().clone()).collect();
        Some(SchedSummary::new(
            prefix,
            self.running(),
            inner.channel_args,
            inner.pool_args,
            inner.crawl_depth,
            inner.chanman.summary(),
            inner.req_cache.summary(),
            inner.dl_pool.used(),
            inner.dl_pool.total(),
            inner.analyzer_pool.used(),
            inner.analyzer_pool.total(),
            inner.item_pipeline.summary(),
            urls,
            inner.stop_sign.summary(),
            inner.dropped_errors.load(Ordering::SeqCst),
        ))
    }
}

impl SchedulerInner {
    fn start_downloading(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let req_rx = match inner.chanman.req_chan() {
                Ok((_tx, rx)) => rx,
                Err(err) => {
                    error!("downloading loop can not get the request channel: {err}");
                    return;
                }
            };
            while let Ok(req) = req_rx.recv().await {
                let worker = Arc::clone(&inner);
                tokio::spawn(async move { worker.download(req).await });
            }
            trace!("downloading loop finished");
        });
    }

    async fn download(&self, req: Request) {
        let downloader = match self.dl_pool.take().await {
            Ok(downloader) => downloader,
            Err(err) => {
                self.send_error(anyhow!("downloader pool error: {err}"), SCHEDULER_CODE);
                return;
            }
        };
        let code = generate_code(DOWNLOADER_CODE, downloader.id());
        match downloader.download(req).await {
            Ok(resp) => {
                self.send_resp(resp, &code).await;
            }
            Err(err) => {
                self.send_error(err, &code);
            }
        }
        if let Err(err) = self.dl_pool.give_back(downloader) {
            self.send_error(anyhow!("downloader pool error: {err}"), SCHEDULER_CODE);
        }
    }

    fn activate_analyzers(self: &Arc<Self>, parsers: Arc<Vec<ParseResponse>>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let resp_rx = match inner.chanman.resp_chan() {
                Ok((_tx, rx)) => rx,
                Err(err) => {
                    error!("analyzing loop can not get the response channel: {err}");
                    return;
                }
            };
            while let Ok(resp) = resp_rx.recv().await {
                let worker = Arc::clone(&inner);
                let parsers = Arc::clone(&parsers);
                tokio::spawn(async move { worker.analyze(parsers, resp).await });
            }
            trace!("analyzing loop finished");
        });
    }

    async fn analyze(&self, parsers: Arc<Vec<ParseResponse>>, resp: Response) {
        let analyzer = match self.analyzer_pool.take().await {
            Ok(analyzer) => analyzer,
            Err(err) => {
                self.send_error(anyhow!("analyzer pool error: {err}"), SCHEDULER_CODE);
                return;
            }
        };
        let code = generate_code(ANALYZER_CODE, analyzer.id());
        // A panicking parser must not leak the pooled analyzer.
        let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&parsers, &resp)));
        match outcome {
            Ok((data_list, errors)) => {
                for data in data_list {
                    match data {
                        Data::Request(req) => {
                            self.save_req_to_cache(req, &code);
                        }
                        Data::Item(item) => {
                            self.send_item(item, &code).await;
                        }
                    }
                }
                for err in errors {
                    self.send_error(err, &code);
                }
            }
            Err(panic) => {
                error!(code = %code, "fatal analysis error: {}", panic_message(panic.as_ref()));
            }
        }
        if let Err(err) = self.analyzer_pool.give_back(analyzer) {
            self.send_error(anyhow!("analyzer pool error: {err}"), SCHEDULER_CODE);
        }
    }

    fn open_item_pipeline(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let item_rx = match inner.chanman.item_chan() {
                Ok((_tx, rx)) => rx,
                Err(err) => {
                    error!("item loop can not get the item channel: {err}");
                    return;
                }
            };
            while let Ok(item) = item_rx.recv().await {
                let worker = Arc::clone(&inner);
                tokio::spawn(async move {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| worker.item_pipeline.send(item)));
                    match outcome {
                        Ok(errors) => {
                            for err in errors {
                                worker.send_error(err, ITEM_PIPELINE_CODE);
                            }
                        }
                        Err(panic) => {
                            error!(
                                "fatal item processing error: {}",
                                panic_message(panic.as_ref())
                            );
                        }
                    }
                });
            }
            trace!("item loop finished");
        });
    }

    // Moves cached requests into the request channel whenever it has room,
    // checking the stop sign between sends.
    fn schedule(self: &Arc<Self>, interval: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if inner.stop_sign.signed() {
                    inner.stop_sign.deal(SCHEDULER_CODE);
                    return;
                }
                let req_tx = match inner.chanman.req_chan() {
                    Ok((tx, _rx)) => tx,
                    Err(_) => return,
                };
                let mut remainder = req_tx.capacity().saturating_sub(req_tx.len());
                while remainder > 0 {
                    let Some(req) = inner.req_cache.get() else {
                        break;
                    };
                    if inner.stop_sign.signed() {
                        inner.stop_sign.deal(SCHEDULER_CODE);
                        return;
                    }
                    if req_tx.send(req).await.is_err() {
                        return;
                    }
                    remainder -= 1;
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// The admission filter. A request enters the cache only with an http
    /// scheme, an unseen URL, the seed's primary domain, a depth within the
    /// crawl bound, and the stop sign down.
    fn save_req_to_cache(&self, req: Request, code: &str) -> bool {
        let req_url = req.url().clone();
        if req_url.scheme().to_lowercase() != "http" {
            warn!(url = %req_url, scheme = req_url.scheme(), "ignore the request: its url scheme is not 'http'");
            return false;
        }
        let url_str = req_url.as_str().to_string();
        if self.url_set.contains(&url_str) {
            warn!(url = %req_url, "ignore the request: its url is repeated");
            return false;
        }
        let host = req_url.host_str().unwrap_or_default();
        match primary_domain(host) {
            Ok(domain) if domain == self.primary_domain => {}
            _ => {
                warn!(
                    url = %req_url,
                    host,
                    primary_domain = %self.primary_domain,
                    "ignore the request: its host is not in the primary domain",
                );
                return false;
            }
        }
        if req.depth() > self.crawl_depth {
            warn!(
                url = %req_url,
                depth = req.depth(),
                crawl_depth = self.crawl_depth,
                "ignore the request: its depth is greater than the crawl depth",
            );
            return false;
        }
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        // Insert doubles as the final dedup check: concurrent admissions of
        // the same URL race here and exactly one wins.
        if !self.url_set.insert(url_str) {
            warn!(url = %req_url, "ignore the request: its url is repeated");
            return false;
        }
        self.req_cache.put(req);
        true
    }

    async fn send_resp(&self, resp: Response, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let Ok((resp_tx, _rx)) = self.chanman.resp_chan() else {
            return false;
        };
        resp_tx.send(resp).await.is_ok()
    }

    async fn send_item(&self, item: crate::data::Item, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let Ok((item_tx, _rx)) = self.chanman.item_chan() else {
            return false;
        };
        item_tx.send(item).await.is_ok()
    }

    // Errors never block a producer: a full error channel drops the error
    // and counts the drop.
    fn send_error(&self, err: anyhow::Error, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let kind = match parse_code(code).0 {
            DOWNLOADER_CODE => ErrorKind::Downloader,
            ANALYZER_CODE => ErrorKind::Analyzer,
            ITEM_PIPELINE_CODE => ErrorKind::ItemProcessor,
            _ => ErrorKind::Scheduler,
        };
        let crawler_error = CrawlerError::new(kind, err.to_string());
        let Ok((error_tx, _rx)) = self.chanman.error_chan() else {
            return false;
        };
        match error_tx.try_send(crawler_error) {
            Ok(true) => true,
            Ok(false) => {
                self.dropped_errors.fetch_add(1, Ordering::SeqCst);
                warn!(code, "the error channel is full, dropping an error");
                false
            }
            Err(_) => false,
        }
    }
}
