//! Tunables for the control plane.

use chartops_core::payload::DEFAULT_CHART_TYPE;
use chartops_core::throughput::DEFAULT_WINDOW_HOURS;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chart type used for formula checks when the visual payload names none.
    pub default_chart_type: String,
    /// Trailing window for throughput statistics.
    pub throughput_window_hours: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_chart_type: DEFAULT_CHART_TYPE.to_string(),
            throughput_window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}
