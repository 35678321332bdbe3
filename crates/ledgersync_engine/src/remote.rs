//! Remote-apply boundary for sync operations.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Result type for remote-apply calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from the remote boundary.
///
/// The engine branches on the variant: transport problems and timeouts
/// are retryable, rejections are permanent after one attempt, and a
/// version conflict is a distinct non-retried outcome requiring external
/// resolution.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Failure detail.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// The call exceeded the configured timeout. Retryable.
    #[error("remote call timed out")]
    Timeout,

    /// The remote rejected the payload (validation, 4xx). Retrying will
    /// not change the outcome.
    #[error("remote rejected operation: {0}")]
    Rejected(String),

    /// The remote's stored version is not the one this mutation assumed.
    #[error("version conflict for record {record_id}")]
    Conflict {
        /// The conflicted record's offline id.
        record_id: String,
        /// The version the remote holds, when reported.
        remote_version: Option<u32>,
    },
}

impl RemoteError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { retryable, .. } => *retryable,
            RemoteError::Timeout => true,
            RemoteError::Rejected(_) | RemoteError::Conflict { .. } => false,
        }
    }

    /// Returns true for a version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }
}

/// Acknowledgement of a successfully applied operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAck {
    /// The remote-assigned identifier, present for accepted creates.
    pub server_id: Option<String>,
}

impl RemoteAck {
    /// Creates an acknowledgement carrying a remote identifier.
    #[must_use]
    pub fn with_server_id(server_id: impl Into<String>) -> Self {
        Self {
            server_id: Some(server_id.into()),
        }
    }
}

/// The per-table remote boundary.
///
/// One implementation per entity table, registered in the
/// [`crate::TableRegistry`]. `data` is the record snapshot taken at
/// enqueue time; it carries the record's `offline_id` and `version`, which
/// the remote uses for its optimistic concurrency check.
///
/// The engine passes its configured per-call `timeout` with every
/// dispatch; implementations enforce it on the underlying transport and
/// surface an overrun as [`RemoteError::Timeout`].
pub trait RemoteApplier: Send + Sync {
    /// Applies a create, returning the remote-assigned identifier.
    fn apply_create(&self, data: &serde_json::Value, timeout: Duration)
        -> RemoteResult<RemoteAck>;

    /// Applies an update.
    fn apply_update(&self, data: &serde_json::Value, timeout: Duration) -> RemoteResult<()>;

    /// Applies a delete (tombstone).
    fn apply_delete(&self, data: &serde_json::Value, timeout: Duration) -> RemoteResult<()>;
}

/// A scriptable remote for testing.
///
/// By default every call succeeds and creates are acknowledged with a
/// generated `srv-N` identifier. Failures can be scripted per call with
/// [`MockRemote::push_outcome`]; scripted outcomes are consumed in order
/// across all three methods. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockRemote {
    script: Mutex<VecDeque<RemoteResult<()>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    timeouts: Mutex<Vec<Duration>>,
    next_server_id: AtomicU64,
}

impl MockRemote {
    /// Creates a remote that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of the next unscripted call.
    pub fn push_outcome(&self, outcome: RemoteResult<()>) {
        self.script.lock().push_back(outcome);
    }

    /// Scripts `n` consecutive failures with the same error.
    pub fn push_failures(&self, error: RemoteError, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(Err(error.clone()));
        }
    }

    /// Returns the recorded calls as `(method, payload)` pairs.
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().clone()
    }

    /// Returns how many calls were made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the timeout received with each call, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    fn record(
        &self,
        method: &str,
        data: &serde_json::Value,
        timeout: Duration,
    ) -> RemoteResult<()> {
        self.calls.lock().push((method.to_string(), data.clone()));
        self.timeouts.lock().push(timeout);
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}

impl RemoteApplier for MockRemote {
    fn apply_create(
        &self,
        data: &serde_json::Value,
        timeout: Duration,
    ) -> RemoteResult<RemoteAck> {
        self.record("create", data, timeout)?;
        let n = self.next_server_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteAck::with_server_id(format!("srv-{n}")))
    }

    fn apply_update(&self, data: &serde_json::Value, timeout: Duration) -> RemoteResult<()> {
        self.record("update", data, timeout)
    }

    fn apply_delete(&self, data: &serde_json::Value, timeout: Duration) -> RemoteResult<()> {
        self.record("delete", data, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(RemoteError::transport_retryable("connection reset").is_retryable());
        assert!(!RemoteError::transport_fatal("bad certificate").is_retryable());
        assert!(RemoteError::Timeout.is_retryable());
        assert!(!RemoteError::Rejected("invalid amount".into()).is_retryable());

        let conflict = RemoteError::Conflict {
            record_id: "tx-1".into(),
            remote_version: Some(4),
        };
        assert!(!conflict.is_retryable());
        assert!(conflict.is_conflict());
    }

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn mock_remote_defaults_to_success() {
        let remote = MockRemote::new();
        let data = serde_json::json!({"offline_id": "tx-1"});

        let ack = remote.apply_create(&data, TIMEOUT).unwrap();
        assert_eq!(ack.server_id.as_deref(), Some("srv-1"));

        remote.apply_update(&data, TIMEOUT).unwrap();
        remote.apply_delete(&data, TIMEOUT).unwrap();
        assert_eq!(remote.call_count(), 3);
        assert_eq!(remote.calls()[0].0, "create");
        assert_eq!(remote.timeouts(), vec![TIMEOUT; 3]);
    }

    #[test]
    fn scripted_outcomes_are_consumed_in_order() {
        let remote = MockRemote::new();
        remote.push_outcome(Err(RemoteError::Timeout));
        remote.push_outcome(Ok(()));

        let data = serde_json::json!({});
        assert!(matches!(
            remote.apply_update(&data, TIMEOUT),
            Err(RemoteError::Timeout)
        ));
        assert!(remote.apply_update(&data, TIMEOUT).is_ok());
        // Script exhausted: back to default success.
        assert!(remote.apply_update(&data, TIMEOUT).is_ok());
    }
}
