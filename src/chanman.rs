//! Lifecycle management for the four crawl channels.
//!
//! The manager owns the request, response, item, and error channels as one
//! bundle behind a three-state machine: uninitialized -> initialized ->
//! closed. Accessors hand out endpoint clones only while initialized, so a
//! worker can never obtain an endpoint of a closed bundle; workers that
//! already hold clones observe the close as a receive error and wind down.

use std::fmt;

use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::RwLock;
use thiserror::Error;

use crate::args::ChannelArgs;
use crate::data::{Item, Request, Response};
use crate::error::CrawlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelManagerStatus {
    Uninitialized,
    Initialized,
    Closed,
}

impl ChannelManagerStatus {
    pub fn name(self) -> &'static str {
        match self {
            ChannelManagerStatus::Uninitialized => "uninitialized",
            ChannelManagerStatus::Initialized => "initialized",
            ChannelManagerStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelManagerError {
    #[error("the channel capacity can not be 0")]
    InvalidLength,
    #[error("the channel manager is {0}")]
    NotInitialized(&'static str),
}

struct ChannelBundle {
    req_tx: AsyncSender<Request>,
    req_rx: AsyncReceiver<Request>,
    resp_tx: AsyncSender<Response>,
    resp_rx: AsyncReceiver<Response>,
    item_tx: AsyncSender<Item>,
    item_rx: AsyncReceiver<Item>,
    error_tx: AsyncSender<CrawlerError>,
    error_rx: AsyncReceiver<CrawlerError>,
}

struct ManagerState {
    status: ChannelManagerStatus,
    args: ChannelArgs,
    bundle: Option<ChannelBundle>,
}

pub struct ChannelManager {
    state: RwLock<ManagerState>,
}

impl ChannelManager {
    /// Builds a manager and initializes its channel bundle in one step.
    pub fn new(args: ChannelArgs) -> Result<Self, ChannelManagerError> {
        let manager = ChannelManager {
            state: RwLock::new(ManagerState {
                status: ChannelManagerStatus::Uninitialized,
                args: ChannelArgs::new(0, 0, 0, 0),
                bundle: None,
            }),
        };
        manager.init(args, true)?;
        Ok(manager)
    }

    /// (Re)allocates all four channels at the given capacities.
    ///
    /// Returns `Ok(false)` without touching anything when the manager is
    /// already initialized and `reset` is not set.
    pub fn init(&self, args: ChannelArgs, reset: bool) -> Result<bool, ChannelManagerError> {
        if args.check().is_err() {
            return Err(ChannelManagerError::InvalidLength);
        }
        let mut state = self.state.write();
        if state.status == ChannelManagerStatus::Initialized && !reset {
            return Ok(false);
        }
        let (req_tx, req_rx) = kanal::bounded_async(args.req_chan_len());
        let (resp_tx, resp_rx) = kanal::bounded_async(args.resp_chan_len());
        let (item_tx, item_rx) = kanal::bounded_async(args.item_chan_len());
        let (error_tx, error_rx) = kanal::bounded_async(args.error_chan_len());
        state.args = args;
        state.bundle = Some(ChannelBundle {
            req_tx,
            req_rx,
            resp_tx,
            resp_rx,
            item_tx,
            item_rx,
            error_tx,
            error_rx,
        });
        state.status = ChannelManagerStatus::Initialized;
        Ok(true)
    }

    /// Closes all four channels. Returns false unless the manager was
    /// initialized, so a second close is a no-op.
    pub fn close(&self) -> bool {
        let mut state = self.state.write();
        if state.status != ChannelManagerStatus::Initialized {
            return false;
        }
        if let Some(bundle) = state.bundle.take() {
            let _ = bundle.req_tx.close();
            let _ = bundle.resp_tx.close();
            let _ = bundle.item_tx.close();
            let _ = bundle.error_tx.close();
        }
        state.status = ChannelManagerStatus::Closed;
        true
    }

    pub fn req_chan(
        &self,
    ) -> Result<(AsyncSender<Request>, AsyncReceiver<Request>), ChannelManagerError> {
        let state = self.state.read();
        match &state.bundle {
            Some(bundle) if state.status == ChannelManagerStatus::Initialized => {
                Ok((bundle.req_tx.clone(), bundle.req_rx.clone()))
            }
            _ => Err(ChannelManagerError::NotInitialized(state.status.name())),
        }
    }

    pub fn resp_chan(
        &self,
    ) -> Result<(AsyncSender<Response>, AsyncReceiver<Response>), ChannelManagerError> {
        let state = self.state.read();
        match &state.bundle {
            Some(bundle) if state.status == ChannelManagerStatus::Initialized => {
                Ok((bundle.resp_tx.clone(), bundle.resp_rx.clone()))
            }
            _ => Err(ChannelManagerError::NotInitialized(state.status.name())),
        }
    }

    pub fn item_chan(
        &self,
    ) -> Result<(AsyncSender<Item>, AsyncReceiver<Item>), ChannelManagerError> {
        let state = self.state.read();
        match &state.bundle {
            Some(bundle) if state.status == ChannelManagerStatus::Initialized => {
                Ok((bundle.item_tx.clone(), bundle.item_rx.clone()))
            }
            _ => Err(ChannelManagerError::NotInitialized(state.status.name())),
        }
    }

    pub fn error_chan(
        &self,
    ) -> Result<(AsyncSender<CrawlerError>, AsyncReceiver<CrawlerError>), ChannelManagerError> {
        let state = self.state.read();
        match &state.bundle {
            Some(bundle) if state.status == ChannelManagerStatus::Initialized => {
                Ok((bundle.error_tx.clone(), bundle.error_rx.clone()))
            }
            _ => Err(ChannelManagerError::NotInitialized(state.status.name())),
        }
    }

    pub fn status(&self) -> ChannelManagerStatus {
        self.state.read().status
    }

    /// Status plus length/capacity of each channel.
    pub fn summary(&self) -> String {
        let state = self.state.read();
        match &state.bundle {
            Some(bundle) if state.status == ChannelManagerStatus::Initialized => format!(
                "status: {}, requestChannel: {}/{}, responseChannel: {}/{}, itemChannel: {}/{}, errorChannel: {}/{}",
                state.status,
                bundle.req_tx.len(),
                state.args.req_chan_len(),
                bundle.resp_tx.len(),
                state.args.resp_chan_len(),
                bundle.item_tx.len(),
                state.args.item_chan_len(),
                bundle.error_tx.len(),
                state.args.error_chan_len(),
            ),
            _ => format!("status: {}", state.status),
        }
    }
}
