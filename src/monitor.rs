//! An out-of-band watchdog for a running scheduler.
//!
//! [`monitoring`] launches three tasks: an error reporter draining the
//! scheduler's error channel, a summary recorder logging the scheduler state
//! whenever it changes, and an idle watcher that counts consecutive idle
//! samples and (optionally) stops the scheduler once the crawl has been
//! quiescent long enough. The returned channel yields the final number of
//! idle checks when the watcher terminates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kanal::{AsyncReceiver, AsyncSender};
use tokio::time::sleep;

use crate::scheduler::{SchedSummary, Scheduler};

/// Logging callback of the monitor. Levels: 0 info, 1 warn, 2 error.
pub type Record = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Watches `scheduler` every `interval` (clamped to >= 1ms). After
/// `max_idle_count` (clamped to >= 1000) consecutive idle samples the watcher
/// re-checks idleness, stops the scheduler when `auto_stop` is set, and
/// terminates, sending the cumulative check count on the returned channel.
pub fn monitoring(
    scheduler: Arc<Scheduler>,
    interval: Duration,
    max_idle_count: usize,
    auto_stop: bool,
    detail_summary: bool,
    record: Record,
) -> AsyncReceiver<u64> {
    // Guard the crawl against overly aggressive parameters.
    let interval = interval.max(Duration::from_millis(1));
    let max_idle_count = max_idle_count.max(1000);

    // The idle watcher acknowledges twice on termination, once for each of
    // the other two tasks.
    let (stop_notifier_tx, stop_notifier_rx) = kanal::bounded_async::<u8>(2);
    let (check_count_tx, check_count_rx) = kanal::bounded_async::<u64>(1);

    report_error(
        Arc::clone(&scheduler),
        Arc::clone(&record),
        stop_notifier_rx.clone(),
    );
    record_summary(
        Arc::clone(&scheduler),
        interval,
        detail_summary,
        Arc::clone(&record),
        stop_notifier_rx,
    );
    check_status(
        scheduler,
        interval,
        max_idle_count,
        auto_stop,
        check_count_tx,
        record,
        stop_notifier_tx,
    );

    check_count_rx
}

async fn wait_for_scheduler_start(scheduler: &Scheduler) {
    while !scheduler.running() {
        sleep(Duration::from_millis(1)).await;
    }
}

fn report_error(scheduler: Arc<Scheduler>, record: Record, stop_notifier: AsyncReceiver<u8>) {
    tokio::spawn(async move {
        wait_for_scheduler_start(&scheduler).await;
        loop {
            // A `None` here means the channel manager is gone; nothing left
            // to drain.
            let Some(error_rx) = scheduler.error_chan() else {
                return;
            };
            tokio::select! {
                _ = stop_notifier.recv() => return,
                received = error_rx.recv() => match received {
                    Ok(err) => {
                        record(2, &format!("Error (received from error channel): {err}"));
                    }
                    Err(_) => return,
                },
            }
        }
    });
}

fn record_summary(
    scheduler: Arc<Scheduler>,
    interval: Duration,
    detail_summary: bool,
    record: Record,
    stop_notifier: AsyncReceiver<u8>,
) {
    tokio::spawn(async move {
        wait_for_scheduler_start(&scheduler).await;

        let start_time = Instant::now();
        let mut record_count: u64 = 1;
        let mut prev_num_tasks: Option<usize> = None;
        let mut prev_summary: Option<SchedSummary> = None;

        loop {
            match stop_notifier.try_recv() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => {}
            }
            let curr_num_tasks = tokio::runtime::Handle::current()
                .metrics()
                .num_alive_tasks();
            let Some(curr_summary) = scheduler.summary(" ") else {
                return;
            };

            let changed = prev_num_tasks != Some(curr_num_tasks)
                || prev_summary
                    .as_ref()
                    .map_or(true, |prev| !prev.same(&curr_summary));
            if changed {
                let summary_text = if detail_summary {
                    curr_summary.detail()
                } else {
                    curr_summary.brief()
                };
                let info = format!(
                    "Monitor - Collected information[{record_count}]:\n  Alive task number: {curr_num_tasks}\n  Scheduler:\n{summary_text}  Escaped time: {:?}\n",
                    start_time.elapsed(),
                );
                record(0, &info);
                prev_num_tasks = Some(curr_num_tasks);
                prev_summary = Some(curr_summary);
                record_count += 1;
            }

            sleep(interval).await;
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn check_status(
    scheduler: Arc<Scheduler>,
    interval: Duration,
    max_idle_count: usize,
    auto_stop: bool,
    check_count_tx: AsyncSender<u64>,
    record: Record,
    stop_notifier: AsyncSender<u8>,
) {
    tokio::spawn(async move {
        let mut check_count: u64 = 0;

        wait_for_scheduler_start(&scheduler).await;

        let mut idle_count = 0usize;
        let mut first_idle_time = Instant::now();
        loop {
            check_count += 1;
            if scheduler.idle() {
                idle_count += 1;
                if idle_count == 1 {
                    first_idle_time = Instant::now();
                }
                if idle_count >= max_idle_count {
                    record(
                        0,
                        &format!(
                            "The scheduler has been idle for a period of time (about {:?}). Now consider whether to stop it.",
                            first_idle_time.elapsed(),
                        ),
                    );
                    // The crawl may have picked up again while the message
                    // was being recorded.
                    if scheduler.idle() {
                        if auto_stop {
                            let result = if scheduler.stop() {
                                "success"
                            } else {
                                "failing"
                            };
                            record(0, &format!("Stop scheduler...{result}."));
                        }
                        break;
                    }
                    idle_count = 0;
                }
            } else {
                idle_count = 0;
            }
            sleep(interval).await;
        }

        // Unblock the error reporter and the summary recorder, then hand the
        // final count to the embedder.
        let _ = stop_notifier.send(1).await;
        let _ = stop_notifier.send(2).await;
        let _ = check_count_tx.send(check_count).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ParseResponse;
    use crate::args::{ChannelArgs, PoolArgs};
    use crate::data::{Data, Item};
    use crate::downloader::GenHttpClient;
    use crate::pipeline::ProcessItem;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use reqwest::Method;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reports_pipeline_errors_and_summaries_then_auto_stops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("seed"))
            .mount(&server)
            .await;

        let parser: ParseResponse = Arc::new(|_resp, _depth| {
            let mut item = Item::new();
            item.insert("k".into(), serde_json::json!(1));
            (vec![Data::Item(item)], Vec::new())
        });
        let processor: ProcessItem = Arc::new(|_item| Err(anyhow!("always rejected")));
        let gen_client: GenHttpClient = Arc::new(reqwest::Client::new);

        let scheduler = Arc::new(Scheduler::new());

        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let record: Record = Arc::new(move |level, content: &str| {
            sink.lock().push((level, content.to_string()));
        });

        // Started before the scheduler: the monitor spin-waits for running().
        let check_count_rx = monitoring(
            Arc::clone(&scheduler),
            Duration::from_millis(1),
            1000,
            true,
            false,
            record,
        );

        scheduler
            .start(
                ChannelArgs::new(10, 10, 10, 10),
                PoolArgs::new(2, 2),
                0,
                gen_client,
                vec![parser],
                vec![processor],
                reqwest::Request::new(Method::GET, Url::parse(&format!("{}/", server.uri())).unwrap()),
            )
            .await
            .unwrap();

        let check_count = check_count_rx.recv().await.unwrap();
        assert!(check_count >= 1000, "check count was {check_count}");
        assert!(!scheduler.running());

        let records = records.lock();
        let errors: Vec<_> = records.iter().filter(|(level, _)| *level == 2).collect();
        assert!(
            errors
                .iter()
                .any(|(_, content)| content.contains("Item Processor Error")),
            "no pipeline error reached the monitor: {errors:?}"
        );
        assert!(
            records
                .iter()
                .any(|(level, content)| *level == 0 && content.contains("Scheduler:")),
            "no summary was recorded"
        );
        assert!(
            records
                .iter()
                .any(|(level, content)| *level == 0 && content.contains("Stop scheduler...success")),
            "auto-stop outcome was not recorded"
        );
    }
}
