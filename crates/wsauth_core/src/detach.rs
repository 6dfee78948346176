//! Run the remote-call-and-persist half of a flow on its own task.
//!
//! Dropping the caller (a disconnected HTTP client, an outer timeout) then
//! only stops the wait; the spawned work still records whatever the
//! authority created.

use std::future::Future;

use tracing::Instrument;

use crate::error::{IssuanceError, Result};

pub(crate) async fn run_detached<T, F>(what: &'static str, work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work.in_current_span())
        .await
        .map_err(|e| IssuanceError::Internal(anyhow::anyhow!("{what} task did not complete: {e}")))?
}
