//! Startup argument blocks for the scheduler.
//!
//! Both containers validate themselves with [`ChannelArgs::check`] /
//! [`PoolArgs::check`] before the scheduler builds any component from them,
//! so a zero capacity is rejected synchronously at `start` instead of
//! surfacing later as a stalled channel or an empty pool.

use std::fmt;

use anyhow::{bail, Result};

/// Capacities of the four managed channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelArgs {
    req_chan_len: usize,
    resp_chan_len: usize,
    item_chan_len: usize,
    error_chan_len: usize,
}

impl ChannelArgs {
    pub fn new(
        req_chan_len: usize,
        resp_chan_len: usize,
        item_chan_len: usize,
        error_chan_len: usize,
    ) -> Self {
        ChannelArgs {
            req_chan_len,
            resp_chan_len,
            item_chan_len,
            error_chan_len,
        }
    }

    pub fn req_chan_len(&self) -> usize {
        self.req_chan_len
    }

    pub fn resp_chan_len(&self) -> usize {
        self.resp_chan_len
    }

    pub fn item_chan_len(&self) -> usize {
        self.item_chan_len
    }

    pub fn error_chan_len(&self) -> usize {
        self.error_chan_len
    }

    /// All four capacities must be positive.
    pub fn check(&self) -> Result<()> {
        if self.req_chan_len == 0 {
            bail!("the request channel capacity can not be 0");
        }
        if self.resp_chan_len == 0 {
            bail!("the response channel capacity can not be 0");
        }
        if self.item_chan_len == 0 {
            bail!("the item channel capacity can not be 0");
        }
        if self.error_chan_len == 0 {
            bail!("the error channel capacity can not be 0");
        }
        Ok(())
    }
}

impl fmt::Display for ChannelArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{reqChanLen:{}, respChanLen:{}, itemChanLen:{}, errorChanLen:{}}}",
            self.req_chan_len, self.resp_chan_len, self.item_chan_len, self.error_chan_len
        )
    }
}

/// Sizes of the two worker pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolArgs {
    page_downloader_pool_size: u32,
    analyzer_pool_size: u32,
}

impl PoolArgs {
    pub fn new(page_downloader_pool_size: u32, analyzer_pool_size: u32) -> Self {
        PoolArgs {
            page_downloader_pool_size,
            analyzer_pool_size,
        }
    }

    pub fn page_downloader_pool_size(&self) -> u32 {
        self.page_downloader_pool_size
    }

    pub fn analyzer_pool_size(&self) -> u32 {
        self.analyzer_pool_size
    }

    /// Both pool sizes must be positive.
    pub fn check(&self) -> Result<()> {
        if self.page_downloader_pool_size == 0 {
            bail!("the page downloader pool size can not be 0");
        }
        if self.analyzer_pool_size == 0 {
            bail!("the analyzer pool size can not be 0");
        }
        Ok(())
    }
}

impl fmt::Display for PoolArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{pageDownloaderPoolSize:{}, analyzerPoolSize:{}}}",
            self.page_downloader_pool_size, self.analyzer_pool_size
        )
    }
}
