//! Fixed worker pool over a bounded job queue.
//!
//! Submission never blocks: when every queue slot is taken the caller gets
//! [`DispatchError::QueueFull`] back immediately and decides what to do
//! with the pressure. Each job carries its own cancel token, so one run
//! can be stopped without disturbing its neighbors.

use std::thread::{self, JoinHandle};

use cf_sim::{CancelToken, RunControls};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::backend::SolveBackend;
use crate::error::{DispatchError, DispatchResult};
use crate::request::{SolveRequest, SolveResponse};
use crate::service;

struct Job {
    request: SolveRequest,
    cancel: CancelToken,
    done_tx: Sender<DispatchResult<SolveResponse>>,
}

/// Fixed solver threads behind a bounded queue.
pub struct PooledBackend {
    job_tx: Option<Sender<Job>>,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl PooledBackend {
    /// Spawns `workers` solver threads behind a queue holding up to
    /// `capacity` waiting jobs. A zero worker count is promoted to one.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (job_tx, job_rx) = channel::bounded::<Job>(capacity);
        let workers = (0..workers.max(1))
            .map(|index| {
                let rx = job_rx.clone();
                thread::spawn(move || worker_loop(index, rx))
            })
            .collect();
        Self {
            job_tx: Some(job_tx),
            capacity,
            workers,
        }
    }

    /// Queues a request. Returns a handle for waiting on or cancelling the
    /// job, or [`DispatchError::QueueFull`] when every slot is taken.
    pub fn submit(&self, request: SolveRequest) -> DispatchResult<JobHandle> {
        let cancel = CancelToken::new();
        let (done_tx, done_rx) = channel::bounded(1);
        let job = Job {
            request,
            cancel: cancel.clone(),
            done_tx,
        };
        let tx = self.job_tx.as_ref().ok_or(DispatchError::WorkersStopped)?;
        match tx.try_send(job) {
            Ok(()) => Ok(JobHandle { cancel, done_rx }),
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::WorkersStopped),
        }
    }
}

impl SolveBackend for PooledBackend {
    fn solve(&self, request: SolveRequest) -> DispatchResult<SolveResponse> {
        self.submit(request)?.wait()
    }
}

impl Drop for PooledBackend {
    fn drop(&mut self) {
        // closing the channel lets the workers drain and exit
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(index: usize, rx: Receiver<Job>) {
    for job in rx.iter() {
        let controls = RunControls {
            cancel: Some(job.cancel.clone()),
            ..RunControls::default()
        };
        let outcome = service::execute_with_controls(&job.request, controls);
        if job.done_tx.send(outcome).is_err() {
            debug!(worker = index, "job finished after its handle was dropped");
        }
    }
}

/// Handle on one queued or running job.
pub struct JobHandle {
    cancel: CancelToken,
    done_rx: Receiver<DispatchResult<SolveResponse>>,
}

impl JobHandle {
    /// Asks the job to stop at its next step boundary. A cancelled run
    /// still delivers its partial result through [`JobHandle::wait`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the job finishes.
    pub fn wait(self) -> DispatchResult<SolveResponse> {
        self.done_rx.recv().map_err(|_| DispatchError::WorkersStopped)?
    }
}
