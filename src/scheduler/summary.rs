//! Point-in-time scheduler summaries for the monitor.
//!
//! A summary snapshots every observable piece of scheduler state. The
//! monitor keeps the previous snapshot and records a new one only when
//! [`SchedSummary::same`] says something changed; the URL listing is
//! excluded from that comparison and only rendered by [`SchedSummary::detail`].

use std::fmt;

use crate::args::{ChannelArgs, PoolArgs};

#[derive(Debug, Clone)]
pub struct SchedSummary {
    prefix: String,
    running: bool,
    channel_args: ChannelArgs,
    pool_args: PoolArgs,
    crawl_depth: u32,
    chanman_summary: String,
    req_cache_summary: String,
    dl_pool_used: u32,
    dl_pool_total: u32,
    analyzer_pool_used: u32,
    analyzer_pool_total: u32,
    item_pipeline_summary: String,
    url_count: usize,
    url_detail: String,
    stop_sign_summary: String,
    dropped_errors: u64,
}

impl SchedSummary {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        prefix: &str,
        running: bool,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        crawl_depth: u32,
        chanman_summary: String,
        req_cache_summary: String,
        dl_pool_used: u32,
        dl_pool_total: u32,
        analyzer_pool_used: u32,
        analyzer_pool_total: u32,
        item_pipeline_summary: String,
        urls: Vec<String>,
        stop_sign_summary: String,
        dropped_errors: u64,
    ) -> Self {
        let url_count = urls.len();
        let url_detail = if url_count > 0 {
            let mut detail = String::from("\n");
            for url in urls {
                detail.push_str(prefix);
                detail.push_str(prefix);
                detail.push_str(&url);
                detail.push('\n');
            }
            detail
        } else {
            "\n".to_string()
        };
        SchedSummary {
            prefix: prefix.to_string(),
            running,
            channel_args,
            pool_args,
            crawl_depth,
            chanman_summary,
            req_cache_summary,
            dl_pool_used,
            dl_pool_total,
            analyzer_pool_used,
            analyzer_pool_total,
            item_pipeline_summary,
            url_count,
            url_detail,
            stop_sign_summary,
            dropped_errors,
        }
    }

    fn render(&self, detail: bool) -> String {
        let prefix = &self.prefix;
        let urls = if detail {
            self.url_detail.clone()
        } else {
            "<concealed>\n".to_string()
        };
        format!(
            "{prefix}Running: {}\n\
             {prefix}Channel args: {}\n\
             {prefix}Pool args: {}\n\
             {prefix}Crawl depth: {}\n\
             {prefix}Channels manager: {}\n\
             {prefix}Request cache: {}\n\
             {prefix}Downloader pool: {}/{}\n\
             {prefix}Analyzer pool: {}/{}\n\
             {prefix}Item pipeline: {}\n\
             {prefix}Urls({}): {}\
             {prefix}Stop sign: {}\n\
             {prefix}Dropped errors: {}\n",
            self.running,
            self.channel_args,
            self.pool_args,
            self.crawl_depth,
            self.chanman_summary,
            self.req_cache_summary,
            self.dl_pool_used,
            self.dl_pool_total,
            self.analyzer_pool_used,
            self.analyzer_pool_total,
            self.item_pipeline_summary,
            self.url_count,
            urls,
            self.stop_sign_summary,
            self.dropped_errors,
        )
    }

    /// The summary with the URL listing concealed.
    pub fn brief(&self) -> String {
        self.render(false)
    }

    /// The summary with every seen URL listed.
    pub fn detail(&self) -> String {
        self.render(true)
    }

    /// Whether this snapshot is observably equal to another. The URL listing
    /// text is ignored; the URL count is not.
    pub fn same(&self, other: &SchedSummary) -> bool {
        self.running == other.running
            && self.channel_args == other.channel_args
            && self.pool_args == other.pool_args
            && self.crawl_depth == other.crawl_depth
            && self.chanman_summary == other.chanman_summary
            && self.req_cache_summary == other.req_cache_summary
            && self.dl_pool_used == other.dl_pool_used
            && self.dl_pool_total == other.dl_pool_total
            && self.analyzer_pool_used == other.analyzer_pool_used
            && self.analyzer_pool_total == other.analyzer_pool_total
            && self.item_pipeline_summary == other.item_pipeline_summary
            && self.url_count == other.url_count
            && self.stop_sign_summary == other.stop_sign_summary
            && self.dropped_errors == other.dropped_errors
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn url_count(&self) -> usize {
        self.url_count
    }

    pub fn downloader_pool(&self) -> (u32, u32) {
        (self.dl_pool_used, self.dl_pool_total)
    }

    pub fn analyzer_pool(&self) -> (u32, u32) {
        (self.analyzer_pool_used, self.analyzer_pool_total)
    }

    pub fn dropped_errors(&self) -> u64 {
        self.dropped_errors
    }
}

impl fmt::Display for SchedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(urls: Vec<String>, dl_used: u32) -> SchedSummary {
        SchedSummary::new(
            " ",
            true,
            ChannelArgs::new(10, 10, 10, 10),
            PoolArgs::new(3, 3),
            1,
            "status: initialized".into(),
            "status: open, length: 0, capacity: 0".into(),
            dl_used,
            3,
            0,
            3,
            "failFast: true".into(),
            urls,
            "signed: false".into(),
            0,
        )
    }

    #[test]
    fn brief_conceals_urls_and_detail_lists_them() {
        let snapshot = summary(vec!["http://example.com/".into()], 0);
        assert!(snapshot.brief().contains("Urls(1): <concealed>"));
        assert!(snapshot.detail().contains("http://example.com/"));
    }

    #[test]
    fn same_ignores_url_text_but_not_url_count() {
        let first = summary(vec!["http://example.com/a".into()], 0);
        let second = summary(vec!["http://example.com/b".into()], 0);
        assert!(first.same(&second));

        let more = summary(
            vec!["http://example.com/a".into(), "http://example.com/b".into()],
            0,
        );
        assert!(!first.same(&more));
    }

    #[test]
    fn same_sees_pool_occupancy_changes() {
        let idle = summary(Vec::new(), 0);
        let busy = summary(Vec::new(), 2);
        assert!(!idle.same(&busy));
    }
}
