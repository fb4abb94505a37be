use std::path::Path;
use std::sync::Arc;

use reqflow_core::Tracker;

use crate::error::AppError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
}

impl AppState {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Arc::new(tracker),
        }
    }

    /// Open the project at `root`. The configured store timeout travels with
    /// the tracker settings.
    pub fn open(root: &Path) -> reqflow_core::Result<Self> {
        Ok(Self::new(Tracker::open(root)?))
    }

    /// Run a core call on the blocking pool and wait for its outcome. The
    /// tracker enforces the store timeout itself, before any write starts,
    /// so a `StoreUnavailable` here always means nothing was written.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Tracker) -> reqflow_core::Result<T> + Send + 'static,
    {
        let tracker = self.tracker.clone();
        let result = tokio::task::spawn_blocking(move || f(&tracker))
            .await
            .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
        Ok(result?)
    }
}
