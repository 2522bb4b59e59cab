//! Periodic per-channel statistics logging.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::queue::{ChannelStats, QueueService};

/// Default period between reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Totals across all channels for one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsTotals {
    pub channels: usize,
    pub pending: usize,
    pub processed: u64,
}

impl StatsTotals {
    fn from_stats(stats: &[ChannelStats]) -> Self {
        stats.iter().fold(
            Self {
                channels: stats.len(),
                ..Default::default()
            },
            |mut totals, channel| {
                totals.pending += channel.pending;
                totals.processed += channel.counters.processed;
                totals
            },
        )
    }
}

/// Logs registry statistics on an interval.
pub struct StatsReporter {
    queue: QueueService,
    interval: Duration,
    reset_after_report: bool,
}

impl StatsReporter {
    pub fn new(queue: QueueService) -> Self {
        Self {
            queue,
            interval: DEFAULT_REPORT_INTERVAL,
            reset_after_report: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Zero channel counters after each report.
    pub fn with_reset_after_report(mut self, reset: bool) -> Self {
        self.reset_after_report = reset;
        self
    }

    /// Current statistics for every channel.
    pub async fn collect(&self) -> Vec<ChannelStats> {
        self.queue.registry().await.stats()
    }

    /// Log one report and return the totals.
    pub async fn report(&self) -> StatsTotals {
        let mut registry = self.queue.registry().await;
        let stats = registry.stats();

        for channel in &stats {
            info!(
                channel = %channel.name,
                pending = channel.pending,
                processed = channel.counters.processed,
                enqueued = channel.counters.enqueued,
                dequeued = channel.counters.dequeued,
                last_message = %channel.last_message_time.to_rfc3339(),
                age_secs = channel.age.as_secs(),
                "Channel stats"
            );
        }

        let totals = StatsTotals::from_stats(&stats);
        info!(
            channels = totals.channels,
            pending = totals.pending,
            processed = totals.processed,
            "Queue totals"
        );

        if self.reset_after_report {
            for channel in &stats {
                registry.reset_stats(&channel.name);
            }
        }

        totals
    }

    /// Spawn the reporter as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; skip reporting an empty registry at boot
            interval.tick().await;

            loop {
                interval.tick().await;
                self.report().await;
            }
        })
    }
}
