use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::analyzer::{AnalysisRequest, Analyzer};
use crate::error::{AnalyzerError, PipelineError, Result};

/// Per-chunk timeout and retry schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,

    /// Limit for a single attempt
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 8_000,
            timeout_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(PipelineError::invalid_config("timeout_ms must be > 0"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(PipelineError::invalid_config(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(PipelineError::invalid_config(format!(
                "max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `retry` (0-based), capped at `max_backoff_ms`
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let raw = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let cap = self.max_backoff_ms as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = raw.min(cap).max(0.0) as u64;
        Duration::from_millis(millis)
    }
}

/// Result of analyzing one chunk, with the attempts it took
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub result: std::result::Result<Value, AnalyzerError>,
    pub attempts: u32,
}

/// Call the analyzer with a per-attempt timeout, retrying failures with
/// exponential backoff until `max_retries` is exhausted.
pub async fn analyze_with_retry(
    analyzer: &dyn Analyzer,
    request: &AnalysisRequest,
    policy: &RetryPolicy,
) -> AttemptReport {
    let idx = request.chunk.order_index;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let result = match tokio::time::timeout(policy.timeout(), analyzer.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(AnalyzerError::Timeout(policy.timeout_ms)),
        };

        match result {
            Ok(payload) => {
                log::debug!("chunk {idx}: {} answered on attempt {attempts}", analyzer.name());
                return AttemptReport {
                    result: Ok(payload),
                    attempts,
                };
            }
            Err(err) if attempts > policy.max_retries => {
                log::warn!("chunk {idx}: giving up after {attempts} attempt(s): {err}");
                return AttemptReport {
                    result: Err(err),
                    attempts,
                };
            }
            Err(err) => {
                let delay = policy.backoff_for(attempts - 1);
                log::warn!(
                    "chunk {idx}: attempt {attempts} failed ({err}); retrying in {} ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reasonscan_chunker::TranscriptChunk;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Analyzer for Flaky {
        async fn analyze(&self, _request: &AnalysisRequest) -> std::result::Result<Value, AnalyzerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AnalyzerError::failure(format!("call {call}")))
            } else {
                Ok(json!({}))
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Analyzer for Sleepy {
        async fn analyze(&self, _request: &AnalysisRequest) -> std::result::Result<Value, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!({}))
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            chunk: TranscriptChunk::new(0, 0, "Hello.".to_string()),
            position: 0,
            total_chunks: 1,
            source_label: "test".to_string(),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
            max_backoff_ms: 4,
            timeout_ms: 50,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(4_000));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(8_000));
    }

    #[test]
    fn invalid_policies_rejected() {
        assert!(RetryPolicy::default().validate().is_ok());
        let zero_timeout = RetryPolicy {
            timeout_ms: 0,
            ..RetryPolicy::default()
        };
        assert!(zero_timeout.validate().is_err());
        let shrinking = RetryPolicy {
            backoff_multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(shrinking.validate().is_err());
    }

    #[tokio::test]
    async fn recovers_within_retry_budget() {
        let analyzer = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let report = analyze_with_retry(&analyzer, &request(), &fast_policy(2)).await;
        assert!(report.result.is_ok());
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let analyzer = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let report = analyze_with_retry(&analyzer, &request(), &fast_policy(1)).await;
        assert_eq!(report.attempts, 2);
        assert_eq!(report.result, Err(AnalyzerError::failure("call 1")));
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let report = analyze_with_retry(&Sleepy, &request(), &fast_policy(0)).await;
        assert_eq!(report.attempts, 1);
        assert_eq!(report.result, Err(AnalyzerError::Timeout(50)));
    }
}
