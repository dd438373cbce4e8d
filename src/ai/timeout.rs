//! Unified Timeout Configuration
//!
//! Provides a centralized timeout management system with:
//! - Operation-specific timeout defaults
//! - Helper functions for wrapping async operations
//! - Consistent timeout error handling
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::from_secs(120);
//! let response = with_timeout(
//!     config.llm_request,
//!     provider.generate(&prompt, &params),
//!     "section generation",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{Result, SynthError};

/// Timeouts for the suspension points of a synthesis job
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Section generation call (default: 5 minutes)
    pub llm_request: Duration,
    /// Theme label call; labels are short (default: 1/5 of `llm_request`, at least 10s)
    pub label_request: Duration,
    /// Fragment store query (default: 30 seconds)
    pub store_query: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_secs(net_constants::DEFAULT_TIMEOUT_SECS)
    }
}

impl TimeoutConfig {
    /// Derive all timeouts from the configured LLM call timeout
    pub fn from_secs(llm_secs: u64) -> Self {
        let llm_request = Duration::from_secs(llm_secs);
        Self {
            llm_request,
            label_request: (llm_request / 5).max(Duration::from_secs(10)).min(llm_request),
            store_query: Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SynthError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.llm_request.as_secs(), 300);
        assert_eq!(config.label_request.as_secs(), 60);
        assert_eq!(config.store_query.as_secs(), 30);
    }

    #[test]
    fn test_label_timeout_bounds() {
        let short = TimeoutConfig::from_secs(5);
        assert_eq!(short.label_request, Duration::from_secs(5));
        let mid = TimeoutConfig::from_secs(30);
        assert_eq!(mid.label_request, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, SynthError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, SynthError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), SynthError::Timeout { .. }));
    }
}
