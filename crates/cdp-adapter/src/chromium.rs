use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::DescribeNodeParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CreateIsolatedWorldParams, EventJavascriptDialogOpening, FrameId,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide::js::EvaluationResult;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::ids::SessionId;
use crate::metrics;
use crate::script;
use crate::session::{ElementHandle, ElementSession, SessionFactory};

/// Launches one private Chromium process per session.
pub struct ChromiumSessionFactory {
    config: Arc<CdpConfig>,
}

impl ChromiumSessionFactory {
    pub fn new(config: Arc<CdpConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.config
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn ElementSession>, AdapterError> {
        let session = ChromiumSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }
}

/// A live browser plus the single page every workflow step drives.
pub struct ChromiumSession {
    id: SessionId,
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    dialog_task: JoinHandle<()>,
    dialogs: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Frames entered with `switch_to_frame`, outermost first.
    frames: StdMutex<Vec<FrameId>>,
    /// Isolated world created for the innermost frame.
    world: StdMutex<Option<(FrameId, ExecutionContextId)>>,
    profile_dir: PathBuf,
}

fn guard<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Empties the dialog queue without waiting.
fn drain_pending(dialogs: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut stale = Vec::new();
    while let Ok(message) = dialogs.try_recv() {
        stale.push(message);
    }
    stale
}

impl ChromiumSession {
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let id = SessionId::new();
        let profile_dir = cfg.profile_root.join(id.to_string());
        std::fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to create profile dir: {err}"))
        })?;

        let browser_config = browser_config(cfg, profile_dir.clone())?;
        info!(session = %id, headless = cfg.headless, "launching chromium session");

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!(target: "cdp-session", "CDP handler event loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler_task.abort();
                return Err(AdapterError::io(format!("failed to open page: {err}")));
            }
        };

        let mut dialog_events = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|err| AdapterError::io(format!("failed to subscribe to dialogs: {err}")))?;
        let (dialog_tx, dialog_rx) = mpsc::unbounded_channel();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialog_events.next().await {
                if dialog_tx.send(event.message.clone()).is_err() {
                    break;
                }
            }
        });

        metrics::record_session_opened();
        Ok(Self {
            id,
            page,
            browser: Mutex::new(Some(browser)),
            handler_task,
            dialog_task,
            dialogs: Mutex::new(dialog_rx),
            frames: StdMutex::new(Vec::new()),
            world: StdMutex::new(None),
            profile_dir,
        })
    }

    fn active_frame(&self) -> Option<FrameId> {
        guard(&self.frames).last().cloned()
    }

    fn reset_frames(&self) {
        guard(&self.frames).clear();
        *guard(&self.world) = None;
    }

    /// Execution context for `frame`, creating an isolated world in it when needed.
    ///
    /// Worlds die with the frame's document, so `refresh` forces a new one.
    async fn frame_context(
        &self,
        frame: &FrameId,
        refresh: bool,
    ) -> Result<ExecutionContextId, AdapterError> {
        if !refresh {
            if let Some((cached, context)) = guard(&self.world).as_ref() {
                if cached == frame {
                    return Ok(context.clone());
                }
            }
        }
        let created = self
            .page
            .execute(CreateIsolatedWorldParams::new(frame.clone()))
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::FrameUnavailable)
                    .with_hint(format!("frame {:?} has no usable document: {err}", frame))
            })?;
        let context = created.result.execution_context_id.clone();
        *guard(&self.world) = Some((frame.clone(), context.clone()));
        Ok(context)
    }

    async fn run_expression(
        &self,
        method: &'static str,
        expression: &str,
        context: Option<ExecutionContextId>,
        by_value: bool,
    ) -> Result<EvaluationResult, AdapterError> {
        let mut builder = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(by_value);
        if let Some(context) = context {
            builder = builder.context_id(context);
        }
        let params = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("{method}: invalid evaluate params: {err}"))
        })?;
        self.page
            .evaluate_expression(params)
            .await
            .map_err(|err| AdapterError::io(format!("{method}: {err}")))
    }

    /// Evaluates in the page, or in the isolated world of the innermost entered frame.
    async fn evaluate_scoped(
        &self,
        method: &'static str,
        expression: &str,
        by_value: bool,
    ) -> Result<EvaluationResult, AdapterError> {
        let Some(frame) = self.active_frame() else {
            return self.run_expression(method, expression, None, by_value).await;
        };
        let context = self.frame_context(&frame, false).await?;
        match self
            .run_expression(method, expression, Some(context), by_value)
            .await
        {
            Err(err) if err.kind == AdapterErrorKind::CdpIo => {
                debug!(session = %self.id, error = %err, "frame world gone, recreating");
                let context = self.frame_context(&frame, true).await?;
                self.run_expression(method, expression, Some(context), by_value)
                    .await
            }
            other => other,
        }
    }

    async fn evaluate(&self, method: &'static str, expression: String) -> Result<Value, AdapterError> {
        let started = Instant::now();
        let result = self
            .evaluate_scoped(method, &expression, true)
            .await
            .and_then(|outcome| {
                outcome.into_value::<Value>().map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("{method}: undecodable script result: {err}"))
                })
            });
        metrics::record_command(method, started.elapsed(), result.is_ok());
        result
    }

    async fn run_on(
        &self,
        method: &'static str,
        element: &ElementHandle,
        body: &str,
    ) -> Result<Value, AdapterError> {
        let expression = script::with_element(element, body)?;
        let value = self.evaluate(method, expression).await?;
        script::check_status(&value, element)?;
        Ok(value)
    }

    /// Resolves a frame owner element to its frame through the DOM domain, which works
    /// for cross-origin documents as well.
    async fn resolve_frame(&self, element: &ElementHandle) -> Result<FrameId, AdapterError> {
        let outcome = self
            .evaluate_scoped("switch_to_frame", &script::element_ref(element)?, false)
            .await?;
        let Some(object_id) = outcome.object().object_id.clone() else {
            return Err(AdapterError::not_found(&element.selector));
        };
        let described = self
            .page
            .execute(DescribeNodeParams::builder().object_id(object_id).build())
            .await
            .map_err(|err| AdapterError::io(format!("describe '{}': {err}", element.selector)))?;
        described.result.node.frame_id.clone().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::FrameUnavailable)
                .with_hint(format!("'{}' is not a frame element", element.selector))
        })
    }

    /// Accepts dialogs nobody waited for, so they neither block the page nor answer a
    /// later alert wait.
    async fn discard_stale_dialogs(&self) {
        let stale = {
            let mut dialogs = self.dialogs.lock().await;
            drain_pending(&mut dialogs)
        };
        for message in stale {
            warn!(session = %self.id, %message, "discarding dialog raised outside an alert wait");
            if let Err(err) = self
                .page
                .execute(HandleJavaScriptDialogParams::new(true))
                .await
            {
                debug!(session = %self.id, ?err, "stale dialog already closed");
            }
        }
    }
}

#[async_trait]
impl ElementSession for ChromiumSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        let started = Instant::now();
        let outcome = self.page.goto(url).await.map(|_| ()).map_err(|err| {
            AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("navigation to {url} failed: {err}"))
        });
        metrics::record_command("navigate", started.elapsed(), outcome.is_ok());
        self.reset_frames();
        outcome
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.page
            .url()
            .await
            .map_err(|err| AdapterError::io(format!("current_url: {err}")))?
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::Internal).with_hint("page has no url"))
    }

    async fn find_one(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        let value = self
            .evaluate("find_all", script::count(selector)?)
            .await?;
        if value.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("unexpected answer while counting '{selector}'")));
        }
        let count = value.get("count").and_then(Value::as_u64).unwrap_or(0) as usize;
        Ok((0..count).map(|idx| ElementHandle::new(selector, idx)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        self.discard_stale_dialogs().await;
        self.run_on("click", element, script::CLICK).await.map(|_| ())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AdapterError> {
        self.run_on("type_text", element, &script::type_text(text)?)
            .await
            .map(|_| ())
    }

    async fn select_by_text(
        &self,
        element: &ElementHandle,
        visible_text: &str,
    ) -> Result<(), AdapterError> {
        self.run_on("select", element, &script::select_by_text(visible_text)?)
            .await
            .map(|_| ())
    }

    async fn option_labels(&self, element: &ElementHandle) -> Result<Vec<String>, AdapterError> {
        let value = self
            .run_on("option_labels", element, script::OPTION_LABELS)
            .await?;
        Ok(value
            .get("value")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        let value = self.run_on("text", element, script::TEXT).await?;
        Ok(value
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn submit_form(&self, form: &ElementHandle) -> Result<(), AdapterError> {
        self.discard_stale_dialogs().await;
        self.run_on("submit_form", form, script::SUBMIT)
            .await
            .map(|_| ())
    }

    async fn switch_to_frame(&self, frame: &ElementHandle) -> Result<(), AdapterError> {
        let started = Instant::now();
        let resolved = self.resolve_frame(frame).await;
        metrics::record_command("switch_to_frame", started.elapsed(), resolved.is_ok());
        let frame_id = resolved?;
        self.frame_context(&frame_id, true).await?;
        guard(&self.frames).push(frame_id);
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), AdapterError> {
        self.reset_frames();
        Ok(())
    }

    async fn accept_alert(&self, timeout: Duration) -> Result<Option<String>, AdapterError> {
        let mut dialogs = self.dialogs.lock().await;
        let message = match tokio::time::timeout(timeout, dialogs.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                return Err(AdapterError::new(AdapterErrorKind::SessionClosed)
                    .with_hint("dialog listener stopped"))
            }
            Err(_) => return Ok(None),
        };
        self.page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await
            .map_err(|err| AdapterError::io(format!("failed to accept dialog: {err}")))?;
        debug!(session = %self.id, "accepted dialog");
        Ok(Some(message))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|err| AdapterError::io(format!("screenshot failed: {err}")))
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.dialog_task.abort();
        let browser = self.browser.lock().await.take();
        let Some(mut browser) = browser else {
            return Err(AdapterError::new(AdapterErrorKind::SessionClosed)
                .with_hint("session already closed"));
        };

        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| AdapterError::io(format!("failed to close browser: {err}")));
        if let Err(err) = browser.wait().await {
            warn!(session = %self.id, ?err, "browser process did not exit cleanly");
        }
        self.handler_task.abort();

        if let Err(err) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(session = %self.id, ?err, "profile dir cleanup skipped");
        }
        metrics::record_session_closed();
        info!(session = %self.id, "chromium session closed");
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.dialog_task.abort();
        self.handler_task.abort();
    }
}

fn launch_args(cfg: &CdpConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--disable-background-networking".into(),
        "--disable-breakpad".into(),
        "--disable-component-update".into(),
        "--disable-default-apps".into(),
        "--disable-extensions".into(),
        "--disable-sync".into(),
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--password-store=basic".into(),
        "--use-mock-keychain".into(),
    ];
    if cfg.disable_dev_shm {
        args.push("--disable-dev-shm-usage".into());
    }
    // Keeps cross-origin frames inside the page target, where their worlds are reachable.
    args.push("--disable-site-isolation-trials".into());
    args.push("--disable-features=IsolateOrigins,site-per-process".into());
    if cfg.block_images {
        args.push("--blink-settings=imagesEnabled=false".into());
    }
    if cfg.headless {
        args.push("--headless=new".into());
        args.push("--hide-scrollbars".into());
        args.push("--mute-audio".into());
    }
    args.extend(cfg.extra_args.iter().cloned());
    args
}

fn browser_config(cfg: &CdpConfig, profile_dir: PathBuf) -> Result<BrowserConfig, AdapterError> {
    if let Some(executable) = &cfg.executable {
        if !executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!(
                    "chrome executable not found at {}",
                    executable.display()
                ))
                .with_data(serde_json::json!({
                    "expected": executable,
                    "hint": "Set RENEWAL_CHROME to the full path of chrome/chromium."
                })));
        }
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .window_size(cfg.window_width, cfg.window_height)
        .user_data_dir(profile_dir);

    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }

    builder = builder.args(launch_args(cfg));

    if let Some(executable) = &cfg.executable {
        builder = builder.chrome_executable(executable.clone());
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("browser config error: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_dialogs_are_drained_in_arrival_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("first".to_string()).unwrap();
        tx.send("second".to_string()).unwrap();
        assert_eq!(drain_pending(&mut rx), vec!["first", "second"]);
        assert!(drain_pending(&mut rx).is_empty());

        tx.send("fresh".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("fresh"));
    }

    #[test]
    fn site_isolation_is_disabled_for_frame_access() {
        let cfg = CdpConfig {
            executable: None,
            ..CdpConfig::default()
        };
        let args = launch_args(&cfg);
        assert!(args.iter().any(|arg| arg == "--disable-site-isolation-trials"));
        assert!(args
            .iter()
            .any(|arg| arg == "--disable-features=IsolateOrigins,site-per-process"));
    }

    #[test]
    fn missing_executable_is_reported() {
        let cfg = CdpConfig {
            executable: Some(PathBuf::from("/definitely/not/chrome")),
            ..CdpConfig::default()
        };
        let err = browser_config(&cfg, std::env::temp_dir()).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::CdpIo);
        assert!(err.hint.unwrap().contains("/definitely/not/chrome"));
    }
}
