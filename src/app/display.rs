//! Statistics output for the CLI

use crate::app::args::StatsFormat;
use crate::queue::api::QueueStatistics;
use prettytable::{format, row, Table};

/// One-line summary used for periodic log output
pub fn summary_line(stats: &QueueStatistics) -> String {
    format!(
        "queue '{}': {} queued, {} in flight, {} completed, {} failed, {} dead-lettered, {} rejected ({:.1} msg/s)",
        stats.queue_name,
        stats.queued_count,
        stats.in_flight_count,
        stats.total_completed,
        stats.total_failed,
        stats.dead_letter_count,
        stats.total_rejected,
        stats.throughput
    )
}

pub fn statistics_table(statistics: &[QueueStatistics]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row![
        "Queue",
        "Enqueued",
        "Completed",
        "Failed",
        "Dead",
        "Rejected",
        "Peak",
        "Avg ms",
        "Failure %"
    ]);

    for stats in statistics {
        table.add_row(row![
            stats.queue_name,
            stats.total_enqueued,
            stats.total_completed,
            stats.total_failed,
            stats.dead_letter_count,
            stats.total_rejected,
            format!("{}/{}", stats.peak_queue_size, stats.capacity),
            stats.average_processing_time.as_millis(),
            format!("{:.1}", stats.failure_rate * 100.0)
        ]);
    }
    table
}

pub fn render_statistics(
    statistics: &[QueueStatistics],
    format: StatsFormat,
) -> serde_json::Result<String> {
    match format {
        StatsFormat::Table => Ok(statistics_table(statistics).to_string()),
        StatsFormat::Json => serde_json::to_string_pretty(statistics),
    }
}
