//! Backend seam: one request contract whether a run executes inline or on
//! a worker pool.

use cf_sim::{ProgressEvent, RunControls};

use crate::error::DispatchResult;
use crate::request::{SolveRequest, SolveResponse};
use crate::service;

pub trait SolveBackend {
    /// Runs the request to completion and returns its result.
    fn solve(&self, request: SolveRequest) -> DispatchResult<SolveResponse>;
}

/// Executes on the calling thread. The natural backend for lightweight
/// requests and the only one that can stream progress to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn solve_with_progress(
        &self,
        request: &SolveRequest,
        progress: &mut dyn FnMut(&ProgressEvent),
    ) -> DispatchResult<SolveResponse> {
        service::execute_with_controls(
            request,
            RunControls {
                progress: Some(progress),
                ..RunControls::default()
            },
        )
    }
}

impl SolveBackend for LocalBackend {
    fn solve(&self, request: SolveRequest) -> DispatchResult<SolveResponse> {
        service::execute(&request)
    }
}
