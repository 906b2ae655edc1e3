//! A non-blocking file appender for the simulation's per-run log.
//!
//! The hot path (the scheduling cycle) only ever does a channel send; the
//! actual file write happens on a dedicated worker thread, keeping log
//! writes off the simulation's single thread of control.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

/// Handle to a background thread that appends lines to a log file.
///
/// Dropping this handle (or calling [`FileLogger::stop`] explicitly) closes
/// the channel and joins the worker, flushing anything still queued.
#[derive(Debug)]
pub struct FileLogger {
    tx: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl FileLogger {
    /// Open (truncating) the file at `path` and spawn the worker thread.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut file = File::create(path)?;
        let (tx, rx) = mpsc::channel::<String>();

        let worker = std::thread::spawn(move || {
            for line in rx {
                if let Err(err) = writeln!(file, "{line}") {
                    log::warn!("sim log: write failed: {err}");
                }
            }
        });

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue a line for writing. Never blocks on I/O.
    pub fn log(&self, line: impl Into<String>) {
        if let Some(tx) = &self.tx {
            // The receiver only disappears once the worker has exited, which
            // only happens after `stop` drops the sender, so a send failing
            // here means we're shutting down; drop the line silently.
            let _ = tx.send(line.into());
        }
    }

    /// Close the channel and block until the worker has drained it.
    pub fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FileLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_queued_lines_before_stop_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.log");

        let mut logger = FileLogger::open(&path).unwrap();
        logger.log("hello");
        logger.log("world");
        logger.stop();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[test]
    fn log_after_stop_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.log");

        let mut logger = FileLogger::open(&path).unwrap();
        logger.stop();
        logger.log("too late");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "");
    }
}
