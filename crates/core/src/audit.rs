//! Audit action and entity constants shared by the pipeline and its sinks.

/// Known action types for audit log entries.
pub mod action_types {
    pub const AUTO_APPROVE: &str = "auto_approve";
    pub const ROLLBACK: &str = "rollback";
    pub const BUILD_CANCEL: &str = "build_cancel";
}

/// Entity type names recorded alongside audit entries.
pub mod entity_types {
    pub const CHART_DEFINITION: &str = "chart_definition";
    pub const BUILD_JOB: &str = "build_job";
}
