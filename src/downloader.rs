//! The page downloader worker and its pool.

use std::sync::Arc;

use anyhow::Result;
use tracing::trace;

use crate::data::{Request, Response};
use crate::pool::{Entity, EntityPool, PoolError};

/// Produces a fresh HTTP client; invoked once per downloader at pool
/// construction, so each worker owns its own connection state.
pub type GenHttpClient = Arc<dyn Fn() -> reqwest::Client + Send + Sync>;

/// Executes HTTP requests and wraps the results with their crawl depth.
pub struct PageDownloader {
    id: u32,
    client: reqwest::Client,
}

impl Entity for PageDownloader {
    fn id(&self) -> u32 {
        self.id
    }
}

impl PageDownloader {
    pub fn new(id: u32, client: reqwest::Client) -> Self {
        PageDownloader { id, client }
    }

    /// Fetches the request and buffers the whole body, so the response can be
    /// shared by every parser without consuming a stream.
    pub async fn download(&self, req: Request) -> Result<Response> {
        let depth = req.depth();
        trace!(url = %req.url(), depth, "downloading page");
        let http_resp = self.client.execute(req.into_http_req()).await?;
        let url = http_resp.url().clone();
        let status = http_resp.status();
        let headers = http_resp.headers().clone();
        let body = http_resp.bytes().await?;
        Ok(Response::new(url, status, headers, body, depth))
    }
}

/// Builds a pool of `size` downloaders, one client per worker.
pub fn new_downloader_pool(
    size: u32,
    gen_client: GenHttpClient,
) -> Result<EntityPool<PageDownloader>, PoolError> {
    EntityPool::new(size, |id| PageDownloader::new(id, gen_client()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: &str, depth: u32) -> Request {
        Request::new(
            reqwest::Request::new(Method::GET, Url::parse(url).unwrap()),
            depth,
        )
    }

    #[tokio::test]
    async fn download_buffers_body_and_carries_depth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<a href=\"/next\">next</a>"))
            .mount(&server)
            .await;

        let downloader = PageDownloader::new(0, reqwest::Client::new());
        let resp = downloader
            .download(request(&format!("{}/page", server.uri()), 3))
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.depth(), 3);
        assert_eq!(resp.body().as_ref(), b"<a href=\"/next\">next</a>");
    }

    #[tokio::test]
    async fn transport_failures_surface_as_errors() {
        // Nothing listens on this port.
        let downloader = PageDownloader::new(0, reqwest::Client::new());
        let result = downloader.download(request("http://127.0.0.1:1/", 0)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pool_invokes_the_client_factory_per_entity() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);
        let gen_client: GenHttpClient = Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            reqwest::Client::new()
        });

        let pool = new_downloader_pool(3, gen_client).unwrap();
        assert_eq!(pool.total(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
