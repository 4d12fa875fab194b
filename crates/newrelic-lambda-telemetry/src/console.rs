//! Line-oriented console output used by the stdout delivery channel.

use std::io::{self, Write};

/// Destination for envelope lines on the stdout channel.
///
/// Lambda captures the process's standard output into CloudWatch Logs, where
/// the log processor picks envelopes up by their marker.
pub trait Console: Send + Sync + 'static {
    /// Writes one line, terminated by a newline.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// The process's standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stdout;

impl Console for Stdout {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()
    }
}
