//! Screenshot artifacts keyed by plate number and capture time.

use std::path::{Path, PathBuf};

use cdp_adapter::ElementSession;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    /// Root of the per-plate artifact directories.
    pub directory: PathBuf,
    pub capture_on_failure: bool,
    pub capture_each_step: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("screenshots"),
            capture_on_failure: true,
            capture_each_step: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Diagnostics {
    config: DiagnosticsConfig,
}

impl Diagnostics {
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self { config }
    }

    pub fn disabled() -> Self {
        Self::new(DiagnosticsConfig {
            enabled: false,
            ..DiagnosticsConfig::default()
        })
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub async fn capture_failure(
        &self,
        session: &dyn ElementSession,
        plate: &str,
        label: &str,
    ) -> Option<PathBuf> {
        if !self.config.capture_on_failure {
            return None;
        }
        self.capture(session, plate, label).await
    }

    pub async fn capture_step(
        &self,
        session: &dyn ElementSession,
        plate: &str,
        label: &str,
    ) -> Option<PathBuf> {
        if !self.config.capture_each_step {
            return None;
        }
        self.capture(session, plate, label).await
    }

    /// Writes `<dir>/<plate>/<label>_<timestamp>.png`. Failures are logged and swallowed.
    pub async fn capture(
        &self,
        session: &dyn ElementSession,
        plate: &str,
        label: &str,
    ) -> Option<PathBuf> {
        if !self.config.enabled {
            return None;
        }
        let bytes = match session.screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(plate, label, error = %err, "screenshot capture failed");
                return None;
            }
        };

        let dir = self.config.directory.join(path_segment(plate));
        let path = dir.join(artifact_name(label, Local::now()));
        match write_artifact(&dir, &path, &bytes).await {
            Ok(()) => {
                debug!(plate, path = %path.display(), "screenshot saved");
                Some(path)
            }
            Err(err) => {
                warn!(plate, path = %path.display(), ?err, "failed to save screenshot");
                None
            }
        }
    }
}

async fn write_artifact(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;
    fs::write(path, bytes).await
}

/// Keeps caller-supplied text from escaping the artifact directory.
fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn artifact_name(label: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.png",
        path_segment(label),
        at.format("%Y%m%d_%H%M%S_%3f")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn artifact_names_carry_millisecond_timestamp() {
        let at = Local
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .single()
            .unwrap();
        assert_eq!(
            artifact_name("failed", at),
            "failed_20260314_092653_000.png"
        );
    }

    #[test]
    fn plate_directories_are_sanitized() {
        assert_eq!(path_segment("ABC123"), "ABC123");
        assert_eq!(path_segment("../etc"), "___etc");
        assert_eq!(path_segment("  "), "unknown");
    }
}
