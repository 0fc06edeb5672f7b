//! Build throughput arithmetic over a trailing time window.

use chrono::Duration;
use serde::Serialize;

use crate::types::Timestamp;

/// Default trailing window for throughput statistics.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// One task that reached `Completed` or `Failed` inside the window.
#[derive(Debug, Clone, Copy)]
pub struct FinishedTask {
    pub succeeded: bool,
    pub started_at: Option<Timestamp>,
    pub completed_at: Timestamp,
}

/// Derived, read-only throughput figures.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThroughputStats {
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub window_hours: i64,
    pub jobs_created: i64,
    pub tasks_completed: i64,
    pub tasks_failed: i64,
    /// Mean of `completed_at - started_at` in seconds over tasks with both.
    pub average_task_duration_secs: Option<f64>,
    /// Percentage of finished tasks that succeeded, `None` with no samples.
    pub success_rate_percent: Option<f64>,
    /// Completed tasks per minute, averaged over the whole window.
    pub items_per_minute: f64,
}

/// Start of the trailing window ending at `now`.
pub fn window_start(now: Timestamp, window_hours: i64) -> Timestamp {
    now - Duration::hours(window_hours)
}

/// Compute throughput statistics from pre-filtered window samples.
pub fn compute_throughput(
    now: Timestamp,
    window_hours: i64,
    jobs_created: i64,
    finished: &[FinishedTask],
) -> ThroughputStats {
    let tasks_completed = finished.iter().filter(|t| t.succeeded).count() as i64;
    let tasks_failed = finished.len() as i64 - tasks_completed;

    let durations: Vec<f64> = finished
        .iter()
        .filter_map(|t| {
            let started = t.started_at?;
            Some((t.completed_at - started).num_milliseconds().max(0) as f64 / 1000.0)
        })
        .collect();
    let average_task_duration_secs = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    let success_rate_percent = if finished.is_empty() {
        None
    } else {
        Some(tasks_completed as f64 * 100.0 / finished.len() as f64)
    };

    let window_minutes = (window_hours.max(1) * 60) as f64;

    ThroughputStats {
        window_start: window_start(now, window_hours),
        window_end: now,
        window_hours,
        jobs_created,
        tasks_completed,
        tasks_failed,
        average_task_duration_secs,
        success_rate_percent,
        items_per_minute: tasks_completed as f64 / window_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn empty_window_has_no_rates() {
        let stats = compute_throughput(at(0), 24, 0, &[]);
        assert_eq!(stats.tasks_completed, 0);
        assert_eq!(stats.average_task_duration_secs, None);
        assert_eq!(stats.success_rate_percent, None);
        assert_eq!(stats.items_per_minute, 0.0);
    }

    #[test]
    fn computes_means_and_rates() {
        let finished = [
            FinishedTask { succeeded: true, started_at: Some(at(0)), completed_at: at(1) },
            FinishedTask { succeeded: true, started_at: Some(at(0)), completed_at: at(3) },
            FinishedTask { succeeded: false, started_at: None, completed_at: at(4) },
            FinishedTask { succeeded: true, started_at: Some(at(2)), completed_at: at(4) },
        ];
        let stats = compute_throughput(at(30), 1, 2, &finished);
        assert_eq!(stats.jobs_created, 2);
        assert_eq!(stats.tasks_completed, 3);
        assert_eq!(stats.tasks_failed, 1);
        assert_eq!(stats.average_task_duration_secs, Some(120.0));
        assert_eq!(stats.success_rate_percent, Some(75.0));
        assert_eq!(stats.items_per_minute, 3.0 / 60.0);
        assert_eq!(stats.window_start, window_start(at(30), 1));
    }
}
