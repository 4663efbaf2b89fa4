use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Raw page-content capture for offline diagnosis of empty or failed
/// harvests. Written only on zero-result/error outcomes, never auto-deleted.
#[derive(Debug, Clone)]
pub struct DebugSnapshot {
    pub state: String,
    pub county: String,
    pub content: String,
    pub reason: String,
    pub extension: String,
}

impl DebugSnapshot {
    pub fn new(
        state: impl Into<String>,
        county: impl Into<String>,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            county: county.into(),
            content: content.into(),
            reason: reason.into(),
            extension: "html".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// `<state>_<county>_<timestamp>.<ext>`, county sanitized for filesystems.
    fn filename(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let safe_county = self.county.replace([' ', '/'], "_");
        format!(
            "{}_{}_{}.{}",
            self.state, safe_county, timestamp, self.extension
        )
    }
}

/// Persists debug snapshots under a fixed local directory.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    dir: PathBuf,
}

impl SnapshotRecorder {
    pub const DEFAULT_DIR: &'static str = "debug_failures";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a snapshot, returning the written path.
    ///
    /// Best-effort: a snapshot failure is logged and swallowed so it can
    /// never mask the harvest error that triggered it.
    pub fn save(&self, snapshot: &DebugSnapshot) -> Option<PathBuf> {
        match self.try_save(snapshot) {
            Ok(path) => {
                info!(
                    reason = %snapshot.reason,
                    "Saved debug snapshot: {}",
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                warn!("Failed to save debug snapshot: {}", e);
                None
            }
        }
    }

    fn try_save(&self, snapshot: &DebugSnapshot) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(snapshot.filename());
        fs::write(&path, &snapshot.content)?;
        Ok(path)
    }
}

impl Default for SnapshotRecorder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_writes_content_under_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = SnapshotRecorder::new(tmp.path());

        let snapshot = DebugSnapshot::new("AL", "Baldwin", "<html>empty</html>", "no_properties_found");
        let path = recorder.save(&snapshot).expect("snapshot should be written");

        assert!(path.starts_with(tmp.path()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>empty</html>");
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("AL_Baldwin_"));
        assert!(name.ends_with(".html"));
    }

    #[test]
    fn test_county_name_is_sanitized() {
        let snapshot = DebugSnapshot::new("TX", "El Paso", "x", "err");
        assert!(snapshot.filename().starts_with("TX_El_Paso_"));
    }

    #[test]
    fn test_json_extension() {
        let snapshot = DebugSnapshot::new("AR", "Pulaski", "{}", "bad_payload").with_extension("json");
        assert!(snapshot.filename().ends_with(".json"));
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        // A file path as the directory makes create_dir_all fail
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let recorder = SnapshotRecorder::new(tmp.path());
        let snapshot = DebugSnapshot::new("FL", "Orange", "x", "err");
        assert!(recorder.save(&snapshot).is_none());
    }
}
