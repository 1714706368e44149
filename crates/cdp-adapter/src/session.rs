use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::ids::SessionId;

/// Delay between presence checks while waiting for an element.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reference to the `index`-th match of `selector` in the current document context.
///
/// Handles are resolved lazily on every use, so a handle obtained before a navigation
/// simply stops resolving afterwards instead of pointing at a detached node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    pub fn first(selector: impl Into<String>) -> Self {
        Self::new(selector, 0)
    }
}

/// Capability surface of one live remote browser context.
///
/// Every operation may fail with a not-found or timeout condition; callers decide which of
/// those are recoverable.
#[async_trait]
pub trait ElementSession: Send + Sync {
    fn id(&self) -> SessionId;

    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;

    /// Location of the top-level document.
    async fn current_url(&self) -> Result<String, AdapterError>;

    async fn find_one(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError>;

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError>;

    /// Polls for `selector` until it is present or `timeout` elapses.
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, AdapterError> {
        let started = tokio::time::Instant::now();
        loop {
            if let Some(handle) = self.find_one(selector).await? {
                return Ok(handle);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(AdapterError::timeout(selector, elapsed.as_millis()));
            }
            tokio::time::sleep(DEFAULT_POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError>;

    /// Appends `text` to the element's current value.
    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AdapterError>;

    async fn select_by_text(
        &self,
        element: &ElementHandle,
        visible_text: &str,
    ) -> Result<(), AdapterError>;

    /// Visible labels of a `<select>` element's options, in document order.
    async fn option_labels(&self, element: &ElementHandle) -> Result<Vec<String>, AdapterError>;

    async fn text(&self, element: &ElementHandle) -> Result<String, AdapterError>;

    async fn submit_form(&self, form: &ElementHandle) -> Result<(), AdapterError>;

    /// Routes subsequent DOM queries into the given frame's document.
    async fn switch_to_frame(&self, frame: &ElementHandle) -> Result<(), AdapterError>;

    async fn switch_to_default_content(&self) -> Result<(), AdapterError>;

    /// Waits up to `timeout` for a modal dialog, accepts it and returns its text.
    async fn accept_alert(&self, timeout: Duration) -> Result<Option<String>, AdapterError>;

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError>;

    /// Releases the remote context. Called exactly once per session by the owner.
    async fn close(&self) -> Result<(), AdapterError>;
}

/// Produces exclusively-owned sessions, one per incoming request.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ElementSession>, AdapterError>;
}
