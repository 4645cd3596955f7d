//! Resilience features for registry and destination calls
//!
//! Provides bounded retry with exponential backoff and the configuration
//! that drives it.

pub mod config;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use retry::{RetryConfig, RetryPolicy, RetryableError};
