//! Application state for the API server

use crate::gateway::SubmissionGateway;
use crate::queue::TaskQueue;
use crate::storage::MediaStore;
use std::sync::Arc;

/// Shared state accessible to all route handlers
///
/// Cloned for each request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct ApiState {
    /// Validates and enqueues submissions
    pub gateway: SubmissionGateway,

    /// Read access to stored results
    pub store: Arc<dyn MediaStore>,

    /// Queue, for depth reporting
    pub queue: Arc<dyn TaskQueue>,
}

impl ApiState {
    pub fn new(
        gateway: SubmissionGateway,
        store: Arc<dyn MediaStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            gateway,
            store,
            queue,
        }
    }
}
