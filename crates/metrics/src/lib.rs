//! Metric names shared by the courier crates.
//!
//! Recording goes through the `metrics` facade, so nothing is collected
//! until the embedding application installs a recorder (for example
//! `metrics-exporter-prometheus`).
//!
//! ```rust,ignore
//! use courier_metrics::{counter, labels, queue};
//!
//! counter!(queue::EXECUTED_TOTAL, labels::QUEUE => "text").increment(1);
//! ```

pub use metrics::{counter, gauge, histogram};

/// Dispatch queue metrics
pub mod queue {
    /// Items submitted but not yet completed
    pub const PENDING: &str = "courier_queue_pending";
    /// Items the worker has run, whatever their outcome
    pub const EXECUTED_TOTAL: &str = "courier_queue_executed_total";
    /// Items that returned an error or panicked
    pub const FAILED_TOTAL: &str = "courier_queue_failed_total";
    /// Time from submission to completion in seconds
    pub const ITEM_DURATION_SECONDS: &str = "courier_queue_item_duration_seconds";
}

/// Gateway send metrics
pub mod send {
    /// Gateway calls made
    pub const REQUESTS_TOTAL: &str = "courier_send_requests_total";
    /// Gateway calls that failed or were rejected
    pub const ERRORS_TOTAL: &str = "courier_send_errors_total";
    /// Gateway call duration in seconds
    pub const DURATION_SECONDS: &str = "courier_send_duration_seconds";
}

pub mod labels {
    pub const QUEUE: &str = "queue";
    pub const ENDPOINT: &str = "endpoint";
    pub const SUCCESS: &str = "success";
}
