//! Best-effort fan-out of one message to every configured posting target.
//!
//! Targets are attempted in order and independently: a failure or timeout on
//! one target is recorded and the next target is still attempted. Posts that
//! went out are never retracted.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::constants::DEFAULT_PUBLISH_TIMEOUT_SECS;
use crate::error::PollenError;

/// A destination that accepts a plain-text status update
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Short name used in logs and results
    fn name(&self) -> &str;

    /// Posts `message` as a new status
    async fn post(&self, message: &str) -> anyhow::Result<()>;
}

/// Outcome of posting to a single target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub target: String,
    pub ok: bool,
    pub error: Option<String>,
}

impl PublishResult {
    pub fn sent(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(target: &str, error: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

pub struct Publisher {
    targets: Vec<Box<dyn PublishTarget>>,
    dry_run: bool,
    timeout: Duration,
}

impl Publisher {
    pub fn new(targets: Vec<Box<dyn PublishTarget>>) -> Self {
        Self {
            targets,
            dry_run: false,
            timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
        }
    }

    /// In dry-run mode nothing is sent and no results are produced
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Deadline for each individual target
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Sends `message` to every target, returning one result per target in
    /// target order.
    pub async fn publish(&self, message: &str) -> Vec<PublishResult> {
        if self.dry_run {
            tracing::info!(
                "Dry run, not posting to: {}",
                self.target_names().join(", ")
            );
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let name = target.name();
            let result = match tokio::time::timeout(self.timeout, target.post(message)).await {
                Ok(Ok(())) => {
                    tracing::info!("Posted to {}", name);
                    PublishResult::sent(name)
                }
                Ok(Err(e)) => {
                    tracing::warn!("Posting to {} failed: {:#}", name, e);
                    PublishResult::failed(name, format!("{:#}", e))
                }
                Err(_) => {
                    tracing::warn!("Posting to {} timed out after {:?}", name, self.timeout);
                    PublishResult::failed(name, format!("timed out after {:?}", self.timeout))
                }
            };
            results.push(result);
        }
        results
    }
}

/// Collapses per-target results into a run result carrying every failure.
pub fn aggregate(results: &[PublishResult]) -> Result<(), PollenError> {
    let failures: Vec<PublishResult> = results.iter().filter(|r| !r.ok).cloned().collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(PollenError::PublishFailure(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubTarget {
        name: String,
        fail_with: Option<String>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl StubTarget {
        fn boxed(name: &str, fail_with: Option<&str>, calls: &Arc<AtomicUsize>) -> Box<dyn PublishTarget> {
            Box::new(Self {
                name: name.to_string(),
                fail_with: fail_with.map(str::to_string),
                delay: Duration::ZERO,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl PublishTarget for StubTarget {
        fn name(&self) -> &str {
            &self.name
        }

        async fn post(&self, _message: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.fail_with {
                Some(e) => anyhow::bail!("{}", e),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_partial_failure_attempts_every_target() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let publisher = Publisher::new(vec![
            StubTarget::boxed("a", None, &a_calls),
            StubTarget::boxed("b", Some("rate limited"), &b_calls),
        ]);

        let results = publisher.publish("hello").await;

        assert_eq!(
            results,
            vec![
                PublishResult::sent("a"),
                PublishResult::failed("b", "rate limited"),
            ]
        );
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        match aggregate(&results) {
            Err(PollenError::PublishFailure(failures)) => {
                assert_eq!(failures, vec![PublishResult::failed("b", "rate limited")]);
            }
            other => panic!("expected PublishFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_failure_does_not_stop_later_targets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let publisher = Publisher::new(vec![
            StubTarget::boxed("a", Some("down"), &calls),
            StubTarget::boxed("b", Some("also down"), &calls),
            StubTarget::boxed("c", None, &calls),
        ]);

        let results = publisher.publish("hello").await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(results[2].ok);
        match aggregate(&results) {
            Err(PollenError::PublishFailure(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected PublishFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_targets_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let publisher = Publisher::new(vec![
            StubTarget::boxed("a", None, &calls),
            StubTarget::boxed("b", None, &calls),
        ]);

        let results = publisher.publish("hello").await;
        assert!(aggregate(&results).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let publisher = Publisher::new(vec![StubTarget::boxed("a", None, &calls)]).dry_run(true);

        let results = publisher.publish("hello").await;
        assert!(results.is_empty());
        assert!(aggregate(&results).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_target_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slow: Box<dyn PublishTarget> = Box::new(StubTarget {
            name: "slow".to_string(),
            fail_with: None,
            delay: Duration::from_secs(5),
            calls: Arc::clone(&calls),
        });
        let publisher = Publisher::new(vec![slow, StubTarget::boxed("fast", None, &calls)])
            .timeout(Duration::from_millis(20));

        let results = publisher.publish("hello").await;
        assert!(!results[0].ok);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].ok);
    }
}
