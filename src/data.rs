//! The value types that flow through the managed channels.
//!
//! A [`Request`] is an HTTP request annotated with its crawl depth (the seed
//! is depth 0). A [`Response`] is the fully buffered result of executing one:
//! the downloader reads the whole body into memory before the response enters
//! the response channel, so any number of parsers can read it without
//! consuming a shared stream. [`Item`] is the loosely-typed record parsers
//! extract, and [`Data`] is the tagged output an analyzer hands back to the
//! scheduler for dispatch.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

/// An HTTP request scheduled for download, carrying its crawl depth.
#[derive(Debug)]
pub struct Request {
    http_req: reqwest::Request,
    depth: u32,
}

impl Request {
    pub fn new(http_req: reqwest::Request, depth: u32) -> Self {
        Request { http_req, depth }
    }

    pub fn http_req(&self) -> &reqwest::Request {
        &self.http_req
    }

    pub fn url(&self) -> &Url {
        self.http_req.url()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Rebuilds the request at a different depth, keeping the HTTP request.
    pub fn with_depth(self, depth: u32) -> Self {
        Request {
            http_req: self.http_req,
            depth,
        }
    }

    pub(crate) fn into_http_req(self) -> reqwest::Request {
        self.http_req
    }
}

/// A downloaded page with its body buffered in memory.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes, depth: u32) -> Self {
        Response {
            url,
            status,
            headers,
            body,
            depth,
        }
    }

    /// The final URL of the response, after any redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Depth carried over from the request that produced this response.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// A scraped record: string keys mapped to opaque values.
pub type Item = HashMap<String, serde_json::Value>;

/// Output of a response parser, dispatched by the scheduler on its tag:
/// requests go through the admission filter into the cache, items go to the
/// item pipeline.
#[derive(Debug)]
pub enum Data {
    Request(Request),
    Item(Item),
}
