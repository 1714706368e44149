//! Element interaction adapter for the renewal portal.
//!
//! Higher layers only see the [`ElementSession`] capability surface. A session is one
//! exclusively-owned browser context; the Chromium implementation launches its own
//! browser process per session and tears it down on [`ElementSession::close`].

use std::{env, path::PathBuf};
use which::which;

mod chromium;
pub mod metrics;
mod script;
mod session;

pub use chromium::{ChromiumSession, ChromiumSessionFactory};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use ids::SessionId;
pub use session::{ElementHandle, ElementSession, SessionFactory, DEFAULT_POLL_INTERVAL};

pub mod ids {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use uuid::Uuid;

    /// Unique identifier for one browser session.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct SessionId(pub Uuid);

    impl SessionId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for SessionId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Display for SessionId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// Coarse classification of adapter failures.
    #[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("wait timed out")]
        WaitTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("option not found")]
        OptionNotFound,
        #[error("frame not accessible")]
        FrameUnavailable,
        #[error("session closed")]
        SessionClosed,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn not_found(selector: &str) -> Self {
            Self::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no element matches '{}'", selector))
        }

        pub fn timeout(selector: &str, waited_ms: u128) -> Self {
            Self::new(AdapterErrorKind::WaitTimeout)
                .with_hint(format!("'{}' not present after {}ms", selector, waited_ms))
                .retriable(true)
        }

        pub fn io(hint: impl Into<String>) -> Self {
            Self::new(AdapterErrorKind::CdpIo).with_hint(hint).retriable(true)
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        /// Missing elements and expired waits are expected on a portal whose layout varies.
        pub fn is_absence(&self) -> bool {
            matches!(
                self.kind,
                AdapterErrorKind::TargetNotFound
                    | AdapterErrorKind::WaitTimeout
                    | AdapterErrorKind::OptionNotFound
            )
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// Process-wide browser profile. Built once at startup and shared read-only by every
    /// session factory; nothing in it varies per request.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: Option<PathBuf>,
        pub headless: bool,
        pub no_sandbox: bool,
        pub disable_dev_shm: bool,
        pub block_images: bool,
        pub window_width: u32,
        pub window_height: u32,
        pub launch_timeout_ms: u64,
        pub request_timeout_ms: u64,
        /// Parent directory for the throwaway per-session profiles.
        pub profile_root: PathBuf,
        pub extra_args: Vec<String>,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable(),
                headless: resolve_headless_default(),
                no_sandbox: true,
                disable_dev_shm: true,
                block_images: true,
                window_width: 1280,
                window_height: 900,
                launch_timeout_ms: 20_000,
                request_timeout_ms: 30_000,
                profile_root: env::temp_dir().join("plate-renewal-profiles"),
                extra_args: Vec::new(),
            }
        }
    }

    fn resolve_headless_default() -> bool {
        // "0", "false", "no", "off" means headful
        match env::var("RENEWAL_HEADLESS") {
            Ok(value) => {
                let lower = value.to_ascii_lowercase();
                !matches!(lower.as_str(), "0" | "false" | "no" | "off")
            }
            Err(_) => true,
        }
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("RENEWAL_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_kinds_are_classified() {
        assert!(AdapterError::not_found("#zip").is_absence());
        assert!(AdapterError::timeout("#zip", 10).is_absence());
        assert!(!AdapterError::io("socket closed").is_absence());
        assert!(!AdapterError::new(AdapterErrorKind::FrameUnavailable).is_absence());
    }

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::not_found("#streetnum");
        assert_eq!(
            err.to_string(),
            "target element not found: no element matches '#streetnum'"
        );
    }

    #[test]
    fn default_profile_blocks_images() {
        let cfg = CdpConfig::default();
        assert!(cfg.block_images);
        assert!(cfg.no_sandbox);
        assert_eq!(cfg.request_timeout_ms, 30_000);
    }
}
