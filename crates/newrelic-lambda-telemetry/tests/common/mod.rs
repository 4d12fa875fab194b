//! Shared test doubles for delivery integration tests.

#![allow(dead_code)]

use newrelic_lambda_telemetry::{Console, LogDestination, LogEvent, LogsApi, RemoteLogError};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Console that keeps every line in memory.
#[derive(Clone, Default)]
pub struct CapturedConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturedConsole {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Console for CapturedConsole {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// CloudWatch Logs double that counts calls and can be told to fail.
#[derive(Clone, Default)]
pub struct MockLogsApi {
    fail_put: bool,
    creates: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockLogsApi {
    pub fn failing() -> Self {
        Self {
            fail_put: true,
            ..Self::default()
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl LogsApi for MockLogsApi {
    async fn create_log_stream(&self, _destination: &LogDestination) -> Result<(), RemoteLogError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_log_events(
        &self,
        _destination: &LogDestination,
        events: Vec<LogEvent>,
    ) -> Result<(), RemoteLogError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put {
            return Err(RemoteLogError::api(
                "PutLogEvents",
                io::Error::other("ThrottlingException"),
            ));
        }
        self.messages
            .lock()
            .unwrap()
            .extend(events.into_iter().map(|e| e.message));
        Ok(())
    }
}

/// Destination pinned for tests so the environment is never consulted.
pub fn test_destination() -> LogDestination {
    LogDestination::new("/aws/lambda/test-function", "2024/01/01/[$LATEST]test")
}
