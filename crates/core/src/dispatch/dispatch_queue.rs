use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

type Job = Box<dyn FnOnce() + Send>;

/// A serial execution context backed by one worker thread.
///
/// Jobs run one at a time in submission order. Handles are cheap to clone;
/// the worker drains what is queued and exits once every handle is gone.
#[derive(Clone)]
pub struct DispatchQueue {
    label: Arc<str>,
    job_tx: crossbeam_channel::Sender<Job>,
}

impl DispatchQueue {
    pub fn new(label: &str) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let label: Arc<str> = Arc::from(label);
        let worker_label = label.clone();

        thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in job_rx {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Job on dispatch queue '{worker_label}' panicked");
                    }
                }
            })?;

        Ok(Self { label, job_tx })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queues `job` and returns immediately.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.job_tx.send(Box::new(job)).is_err() {
            // Only reachable if the worker thread died outside a job.
            log::error!("Dispatch queue '{}' is no longer running", self.label);
        }
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.label)
            .finish()
    }
}
