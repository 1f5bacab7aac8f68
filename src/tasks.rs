//! Background task handles
//!
//! Long-running jobs (auto-annotation, tight-box refinement over many
//! regions) run on plain worker threads. A [`TaskHandle`] carries the result
//! back over a bounded channel; tasks run to completion and are never
//! cancelled.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::thread;

/// Handle to a job running on a worker thread
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

/// Run `job` on a new worker thread and return a handle to its result.
pub fn spawn<T, F>(job: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        // The receiver may have been dropped; the result is discarded then.
        let _ = tx.send(job());
    });
    TaskHandle { rx }
}

impl<T> TaskHandle<T> {
    /// Non-blocking poll. Returns the result once the job has finished,
    /// `None` while it is still running.
    pub fn try_result(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the job finishes. A worker that panicked surfaces as an
    /// error here rather than poisoning anything.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().context("worker thread terminated abnormally")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_job_result() {
        let handle = spawn(|| 2 + 2);
        assert_eq!(handle.wait().unwrap(), 4);
    }

    #[test]
    fn test_try_result_is_none_while_running() {
        let handle = spawn(|| {
            thread::sleep(Duration::from_millis(200));
            "done"
        });
        assert!(handle.try_result().is_none());
        assert_eq!(handle.wait().unwrap(), "done");
    }

    #[test]
    fn test_try_result_yields_value_after_completion() {
        let handle = spawn(|| 7u32);
        let mut result = None;
        for _ in 0..100 {
            result = handle.try_result();
            if result.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(result, Some(7));
    }

    #[test]
    fn test_panicked_worker_surfaces_as_error() {
        let handle: TaskHandle<()> = spawn(|| panic!("boom"));
        assert!(handle.wait().is_err());
    }
}
