use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3batch_rs::types::ReconcileStatistics;
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Totals collected by [`show_indicator`] once the stats channel closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSummary {
    pub total_success_count: u64,
    pub total_failure_count: u64,
    pub total_deleted_versions: u64,
    pub total_upload_bytes: u64,
}

impl IndicatorSummary {
    fn processed(&self) -> u64 {
        self.total_success_count + self.total_failure_count
    }

    fn record(&mut self, stats: ReconcileStatistics) -> bool {
        match stats {
            ReconcileStatistics::ItemSuccess { .. } => {
                self.total_success_count += 1;
                true
            }
            ReconcileStatistics::ItemFailure { .. } => {
                self.total_failure_count += 1;
                true
            }
            ReconcileStatistics::VersionDeleted { .. } => {
                self.total_deleted_versions += 1;
                false
            }
            ReconcileStatistics::UploadBytes(size) => {
                self.total_upload_bytes += size;
                false
            }
        }
    }
}

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;

/// Read reconcile statistics until the channel closes, refreshing a one-line
/// progress display every second.
///
/// The returned handle resolves to the final totals and should be awaited
/// after the batch finishes.
pub fn show_indicator(
    stats_receiver: Receiver<ReconcileStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_processed_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut summary = IndicatorSummary::default();

        loop {
            let mut period_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    if summary.record(stats) {
                        period_count += 1;
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let mut items_per_sec = (summary.processed() as f64 / elapsed_secs_f64) as u64;
                    if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        items_per_sec = summary.processed();
                    }

                    info!(
                        message = "batch summary",
                        success = summary.total_success_count,
                        failure = summary.total_failure_count,
                        deleted_versions = summary.total_deleted_versions,
                        uploaded_bytes = summary.total_upload_bytes,
                        items_per_sec = items_per_sec,
                        duration_sec = elapsed_secs_f64,
                    );

                    if show_result {
                        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
                            progress_text.set_style(result_style);
                        }

                        progress_text.finish_with_message(format!(
                            "processed {:>3} items | {:>3} items/sec,  success {},  failure {},  deleted versions {},  uploaded {:>3},  duration {}",
                            summary.processed(),
                            HumanCount(items_per_sec),
                            summary.total_success_count,
                            summary.total_failure_count,
                            summary.total_deleted_versions,
                            HumanBytes(summary.total_upload_bytes),
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            ma_processed_count.add_sample(period_count);

            if show_progress {
                progress_text.set_message(format!(
                    "processed {:>3} items | {:>3} items/sec,  success {},  failure {},  deleted versions {},  uploaded {:>3}",
                    summary.processed(),
                    HumanCount(ma_processed_count.get_average()),
                    summary.total_success_count,
                    summary.total_failure_count,
                    summary.total_deleted_versions,
                    HumanBytes(summary.total_upload_bytes),
                ));
            }
        }
    })
}
