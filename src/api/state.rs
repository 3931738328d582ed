//! Application state for the API server

use crate::BatchZipService;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The batch-zip service handling submissions and retrievals
    pub service: Arc<BatchZipService>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<BatchZipService>) -> Self {
        Self { service }
    }
}
