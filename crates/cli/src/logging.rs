//! stderr log setup.
//!
//! Per-record warnings from the libraries repeat a lot (one bad clicker id can
//! show up in every attendance file), so identical lines are written once.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

pub fn init(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        (false, 1) => EnvFilter::new("info"),
        (false, _) => EnvFilter::new("debug"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(DedupStderr::default())
        .with_target(false)
        .without_time()
        .with_ansi(false)
        .try_init();
}

/// Hands out one buffer per event and forwards it to stderr unless the exact
/// same line was already written.
#[derive(Clone, Default)]
pub struct DedupStderr {
    seen: Arc<Mutex<HashSet<Vec<u8>>>>,
}

pub struct EventLine {
    buf: Vec<u8>,
    seen: Arc<Mutex<HashSet<Vec<u8>>>>,
}

impl<'a> MakeWriter<'a> for DedupStderr {
    type Writer = EventLine;

    fn make_writer(&'a self) -> Self::Writer {
        EventLine { buf: Vec::new(), seen: Arc::clone(&self.seen) }
    }
}

impl Write for EventLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl EventLine {
    /// Records the line; true when it had not been seen before.
    fn first_time(&self) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(self.buf.clone()),
            // Poisoned lock: write anyway.
            Err(_) => true,
        }
    }
}

impl Drop for EventLine {
    fn drop(&mut self) {
        if !self.buf.is_empty() && self.first_time() {
            let _ = io::stderr().write_all(&self.buf);
        }
    }
}
