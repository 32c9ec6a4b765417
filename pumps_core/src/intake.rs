//! Background command intake.
//!
//! A thread owns the line source and pushes complete lines through a bounded
//! channel, so the control loop only ever does a non-blocking `poll()`.
//! The thread ends when the source reaches EOF or errors, or when the
//! reader is dropped and its next send fails.
use crossbeam_channel as xch;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Lines buffered ahead of the control loop.
const QUEUE_DEPTH: usize = 64;

pub struct CommandReader {
    rx: xch::Receiver<String>,
    /// Set by the thread once the source is exhausted.
    eof: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl CommandReader {
    pub fn spawn<B: BufRead + Send + 'static>(source: B) -> Self {
        let (tx, rx) = xch::bounded(QUEUE_DEPTH);
        let eof = Arc::new(AtomicBool::new(false));
        let eof_clone = eof.clone();

        let join_handle = std::thread::spawn(move || {
            for line in source.lines() {
                match line {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        // Consumer gone; nothing left to feed.
                        if tx.send(line).is_err() {
                            tracing::debug!("command consumer disconnected, exiting intake");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "command source failed");
                        break;
                    }
                }
            }
            eof_clone.store(true, Ordering::Release);
            tracing::trace!("command intake exiting");
        });

        Self {
            rx,
            eof,
            join_handle: Some(join_handle),
        }
    }

    /// Next complete line, if one has arrived.
    pub fn poll(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// The source is exhausted and every line has been polled.
    pub fn is_closed(&self) -> bool {
        self.eof.load(Ordering::Acquire) && self.rx.is_empty()
    }
}

impl Drop for CommandReader {
    fn drop(&mut self) {
        // A thread blocked on stdin cannot be interrupted; only reap a
        // thread that already finished.
        if let Some(handle) = self.join_handle.take()
            && handle.is_finished()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "command intake thread panicked");
        }
    }
}
