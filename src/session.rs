//! Session ownership and request admission.
//!
//! Every workflow gets its own browser session and the session is closed exactly once,
//! whatever the workflow does: returns, fails, overruns its deadline or panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{ElementSession, SessionFactory};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::errors::RenewalError;
use crate::metrics;

/// Opens a session, runs `work` against it and releases it on every exit path.
///
/// A panic inside `work` is re-raised after the session has been released.
pub async fn with_session<T, F>(
    factory: &dyn SessionFactory,
    deadline: Option<Duration>,
    work: F,
) -> Result<T, RenewalError>
where
    F: for<'s> FnOnce(&'s dyn ElementSession) -> BoxFuture<'s, Result<T, RenewalError>>,
{
    let session = factory
        .open()
        .await
        .map_err(|err| RenewalError::SessionUnavailable(err.to_string()))?;
    metrics::session_opened();
    debug!(session = %session.id(), "session opened");

    let run = work(session.as_ref());
    let outcome = match deadline {
        Some(limit) => {
            match AssertUnwindSafe(tokio::time::timeout(limit, run))
                .catch_unwind()
                .await
            {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(_elapsed)) => {
                    warn!(session = %session.id(), deadline_secs = limit.as_secs(), "workflow deadline exceeded");
                    Ok(Err(RenewalError::DeadlineExceeded(limit.as_secs())))
                }
                Err(panic) => Err(panic),
            }
        }
        None => AssertUnwindSafe(run).catch_unwind().await,
    };

    release(session.as_ref()).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn release(session: &dyn ElementSession) {
    if let Err(err) = session.close().await {
        warn!(session = %session.id(), error = %err, "session close reported an error");
    }
    metrics::session_released();
    debug!(session = %session.id(), "session released");
}

/// Bounded admission in front of [`with_session`].
///
/// Each admitted workflow runs on its own task, so a caller that goes away does not
/// interrupt the workflow or strand its session.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    permits: Arc<Semaphore>,
    limit: usize,
    admission_wait: Duration,
    deadline: Option<Duration>,
}

impl SessionPool {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        limit: usize,
        admission_wait: Duration,
        deadline: Option<Duration>,
    ) -> Self {
        let limit = limit.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
            admission_wait,
            deadline,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Workflows currently holding a session slot.
    pub fn active(&self) -> usize {
        self.limit.saturating_sub(self.permits.available_permits())
    }

    pub async fn run<T, F>(&self, work: F) -> Result<T, RenewalError>
    where
        T: Send + 'static,
        F: for<'s> FnOnce(&'s dyn ElementSession) -> BoxFuture<'s, Result<T, RenewalError>>
            + Send
            + 'static,
    {
        let permit = match tokio::time::timeout(
            self.admission_wait,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(RenewalError::Busy),
            Err(_elapsed) => {
                warn!(limit = self.limit, "no session slot became free in time");
                return Err(RenewalError::Busy);
            }
        };

        let factory = Arc::clone(&self.factory);
        let deadline = self.deadline;
        let task = tokio::spawn(async move {
            let _permit = permit;
            with_session(factory.as_ref(), deadline, work).await
        });

        match task.await {
            Ok(result) => result,
            Err(join) if join.is_panic() => {
                error!("workflow task panicked");
                Err(RenewalError::Aborted("workflow panicked".to_string()))
            }
            Err(join) => Err(RenewalError::Aborted(join.to_string())),
        }
    }
}
