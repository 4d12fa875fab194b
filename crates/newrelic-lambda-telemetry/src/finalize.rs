//! The finalize hook: where buffered agent data leaves the function.
//!
//! When an invocation completes, the session is drained and encoded and the
//! payload is handed to the injected [`TelemetrySink`] instead of being sent
//! over the network. The hook never fails: encoding and delivery errors are
//! logged and the handler's own outcome is left untouched.

use crate::agent::{AgentSession, Transaction};
use crate::channel::{DeliveryOutcome, TelemetrySink};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared agent session plus the sink that receives its payloads.
///
/// Cloning is cheap; all clones share the same session.
pub struct FinalizeHook<K> {
    session: Arc<Mutex<AgentSession>>,
    sink: K,
}

impl<K: Clone> Clone for FinalizeHook<K> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            sink: self.sink.clone(),
        }
    }
}

impl<K: TelemetrySink> FinalizeHook<K> {
    /// Creates a hook around a session and a sink.
    pub fn new(session: AgentSession, sink: K) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            sink,
        }
    }

    /// Returns the sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Buffers a finished transaction.
    pub fn record(&self, transaction: Transaction) {
        self.lock().record(transaction);
    }

    /// Sets an execution-environment metadata field on the session.
    pub fn set_lambda_metadata(&self, key: &str, value: impl Into<Value>) {
        self.lock().set_lambda_metadata(key, value);
    }

    /// Returns the number of transactions waiting for finalize.
    pub fn pending_transactions(&self) -> usize {
        self.lock().pending_transactions()
    }

    /// Drains the session and delivers the payload.
    ///
    /// Returns the delivery outcome, or `None` if encoding or delivery failed.
    /// The session is empty afterwards in every case.
    pub async fn finalize(&self) -> Option<DeliveryOutcome> {
        let payload = self.lock().finalize();

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode telemetry payload, dropping it");
                return None;
            }
        };

        match self.sink.deliver(payload).await {
            Ok(outcome) => {
                tracing::debug!(?outcome, "Telemetry payload delivered");
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    cause = ?std::error::Error::source(&e),
                    "Failed to deliver telemetry payload"
                );
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
