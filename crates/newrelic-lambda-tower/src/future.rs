//! Future implementation that records the outcome and finalizes.

use crate::extractors::http::process_response;
use newrelic_lambda_telemetry::{FinalizeHook, TelemetrySink, Transaction};
use pin_project::pin_project;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{Instrument, Span};

type Finalizing<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Future that wraps a monitored handler and finalizes the agent session.
///
/// This future:
/// 1. Polls the inner future until completion
/// 2. Records the response (web transactions) or the error on the transaction
/// 3. Buffers the transaction and finalizes the session into the sink
/// 4. Returns the handler's result unchanged
///
/// A panicking handler is recorded as a `panic` error and finalized before
/// the panic resumes.
///
/// The future does NOT return until finalize completes, so the payload has
/// left the process before Lambda can freeze the execution environment.
#[pin_project]
pub struct NewRelicFuture<F, T, E, K> {
    #[pin]
    inner: F,
    span: Span,
    invocation: Option<(Transaction, FinalizeHook<K>)>,
    finalizing: Option<Finalizing<T, E>>,
}

impl<F, T, E, K> NewRelicFuture<F, T, E, K> {
    /// Creates a new monitoring future wrapping the given future.
    pub(crate) fn new(
        inner: F,
        span: Span,
        transaction: Transaction,
        hook: FinalizeHook<K>,
    ) -> Self {
        Self {
            inner,
            span,
            invocation: Some((transaction, hook)),
            finalizing: None,
        }
    }
}

impl<F, T, E, K> Future for NewRelicFuture<F, T, E, K>
where
    F: Future<Output = Result<T, E>>,
    T: Serialize + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    K: TelemetrySink,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Some(finalizing) = this.finalizing.as_mut() {
            return finalizing.as_mut().poll(cx);
        }

        let inner = this.inner;
        let polled = {
            let _guard = this.span.enter();
            panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx)))
        };
        let outcome = match polled {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(result)) => Ok(result),
            Err(payload) => Err(payload),
        };

        let Some((mut transaction, hook)) = this.invocation.take() else {
            return Poll::Ready(outcome.unwrap_or_else(|payload| panic::resume_unwind(payload)));
        };

        match &outcome {
            Ok(result) => record_outcome::<T, E>(&mut transaction, result),
            Err(payload) => record_panic(&mut transaction, &**payload),
        }
        hook.record(transaction);

        let mut finalizing: Finalizing<T, E> = Box::pin(
            async move {
                hook.finalize().await;
                outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
            }
            .instrument(this.span.clone()),
        );
        let poll = finalizing.as_mut().poll(cx);
        *this.finalizing = Some(finalizing);
        poll
    }
}

/// Records the handler outcome and stops the transaction clock.
fn record_outcome<T: Serialize, E: std::fmt::Display>(
    transaction: &mut Transaction,
    result: &Result<T, E>,
) {
    match result {
        Ok(response) if !transaction.is_background_task() => {
            if let Ok(response) = serde_json::to_value(response) {
                process_response(transaction, &response);
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(error = %e, "Handler returned an error");
            transaction.record_error(error_class::<E>(), e.to_string());
        }
    }
    transaction.finish();
}

/// Records a handler panic, using the panic message when it is a string.
fn record_panic(transaction: &mut Transaction, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());

    tracing::error!(panic = %message, "Handler panicked");
    transaction.record_error("panic", message);
    transaction.finish();
}

/// Short class name for a handler error type.
///
/// Boxed trait objects such as `lambda_runtime::Error` erase the concrete
/// type, so they report as `Error`.
fn error_class<E>() -> &'static str {
    let name = std::any::type_name::<E>();
    if name.contains("dyn ") {
        return "Error";
    }
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderError;

    #[test]
    fn test_error_class_is_short_type_name() {
        assert_eq!(error_class::<OrderError>(), "OrderError");
        assert_eq!(error_class::<std::num::ParseIntError>(), "ParseIntError");
        assert_eq!(error_class::<Vec<OrderError>>(), "Vec");
    }

    #[test]
    fn test_boxed_error_class() {
        assert_eq!(error_class::<lambda_runtime::Error>(), "Error");
        assert_eq!(error_class::<Box<dyn std::error::Error>>(), "Error");
    }

    #[test]
    fn test_panic_message_recorded() {
        let mut transaction = Transaction::background("orders");
        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));

        record_panic(&mut transaction, &*payload);

        assert!(transaction.is_error());
    }
}
