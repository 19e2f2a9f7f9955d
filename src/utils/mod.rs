//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! This module provides reusable utilities used throughout the paging
//! implementation.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;

// Re-export public types for advanced users
pub use metrics::{ServerMetrics, ServerMetricsSnapshot, SessionStats};
