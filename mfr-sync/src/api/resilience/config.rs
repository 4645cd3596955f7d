//! Resilience configuration with builder pattern
//!
//! Provides a unified configuration for retry policies, request timeouts
//! and request logging with sane defaults.

use super::retry::RetryConfig;
use std::time::Duration;

/// Global resilience configuration for registry and destination calls
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub monitoring: MonitoringConfig,
    /// Per-request timeout; `None` leaves the transport default in place
    pub request_timeout: Option<Duration>,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringConfig {
    /// Log every outgoing request at debug level
    pub request_logging: bool,
    /// Log request durations
    pub performance_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            monitoring: MonitoringConfig::default(),
            request_timeout: None,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Conservative config for production registries
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            monitoring: MonitoringConfig {
                request_logging: true,
                performance_metrics: true,
                log_level: LogLevel::Warn,
            },
            request_timeout: Some(Duration::from_secs(120)),
        }
    }

    /// Aggressive config for development/testing
    pub fn development() -> Self {
        Self {
            retry: RetryConfig::aggressive(),
            monitoring: MonitoringConfig {
                request_logging: true,
                performance_metrics: true,
                log_level: LogLevel::Debug,
            },
            request_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Disable all resilience features (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig::none(),
            monitoring: MonitoringConfig {
                request_logging: false,
                performance_metrics: false,
                log_level: LogLevel::Error,
            },
            request_timeout: None,
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set max attempts (1 disables retries)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.retry.backoff_multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    /// Set a per-request timeout
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Enable/disable request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Enable/disable performance metrics
    pub fn performance_metrics(mut self, enabled: bool) -> Self {
        self.config.monitoring.performance_metrics = enabled;
        self
    }

    /// Set logging level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
