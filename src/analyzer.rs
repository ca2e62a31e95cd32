//! The response analyzer worker and its pool.
//!
//! An analyzer fans one response out to the embedder-supplied parsers in
//! order, accumulating extracted data and errors across all of them. Every
//! parser sees the same buffered response. Requests coming back from a parser
//! are depth-checked: a follow-up of a depth-`d` response must be depth
//! `d + 1`, and the analyzer rewrites any request whose parser got that
//! wrong.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use crate::data::{Data, Response};
use crate::pool::{Entity, EntityPool, PoolError};

/// A response parser: receives the buffered response and its depth, returns
/// extracted data (follow-up requests and items) plus any parse errors.
pub type ParseResponse =
    Arc<dyn Fn(&Response, u32) -> (Vec<Data>, Vec<anyhow::Error>) + Send + Sync>;

pub struct Analyzer {
    id: u32,
}

impl Entity for Analyzer {
    fn id(&self) -> u32 {
        self.id
    }
}

impl Analyzer {
    pub fn new(id: u32) -> Self {
        Analyzer { id }
    }

    pub fn analyze(
        &self,
        parsers: &[ParseResponse],
        resp: &Response,
    ) -> (Vec<Data>, Vec<anyhow::Error>) {
        if parsers.is_empty() {
            return (Vec::new(), vec![anyhow!("the response parser list is empty")]);
        }
        info!(url = %resp.url(), depth = resp.depth(), "parsing the response");
        let resp_depth = resp.depth();
        let mut data_list = Vec::new();
        let mut error_list = Vec::new();
        for parser in parsers {
            let (parsed_data, parsed_errors) = parser(resp, resp_depth);
            for data in parsed_data {
                append_data(&mut data_list, data, resp_depth);
            }
            error_list.extend(parsed_errors);
        }
        (data_list, error_list)
    }
}

// Follow-up requests always sit one hop below the response that produced
// them, whatever depth the parser stamped.
fn append_data(data_list: &mut Vec<Data>, data: Data, resp_depth: u32) {
    match data {
        Data::Request(req) => {
            let new_depth = resp_depth.saturating_add(1);
            let req = if req.depth() != new_depth {
                req.with_depth(new_depth)
            } else {
                req
            };
            data_list.push(Data::Request(req));
        }
        item @ Data::Item(_) => data_list.push(item),
    }
}

/// Builds a pool of `size` analyzers.
pub fn new_analyzer_pool(size: u32) -> Result<EntityPool<Analyzer>, PoolError> {
    EntityPool::new(size, Analyzer::new)
}
