//! Cold start detection for Lambda functions.
//!
//! A container serves its first invocation cold; every later one is warm.
//! The state is an explicit object shared by the layer and every service it
//! produces, so separate layers (and tests) never interfere with each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-scoped cold-start flag.
///
/// Starts cold and is cleared by the first [`ColdStart::check`]. Clones share
/// the same flag.
///
/// # Example
///
/// ```
/// use newrelic_lambda_tower::ColdStart;
///
/// let cold_start = ColdStart::new();
/// assert!(cold_start.check());
/// assert!(!cold_start.check());
/// ```
#[derive(Debug, Clone)]
pub struct ColdStart(Arc<AtomicBool>);

impl ColdStart {
    /// Creates a flag for a container that has not served an invocation yet.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Returns `true` exactly once, for the first invocation.
    ///
    /// The atomic swap guarantees a single `true` even under concurrent calls.
    pub fn check(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Returns `true` if no invocation has been checked yet.
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for ColdStart {
    fn default() -> Self {
        Self::new()
    }
}
