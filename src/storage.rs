//! Named persistence for recorded timelines
//!
//! One JSON file per recording, `recording_<name>.json`, holding the
//! ordered event records. Writes go through a temporary file and a rename
//! so a failed write cannot leave a previously valid recording half
//! overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::data::{records_from_timeline, timeline_from_records, EventRecord, Timeline};
use crate::error::{Error, Result};

const FILE_PREFIX: &str = "recording_";
const FILE_SUFFIX: &str = ".json";

/// Store for named recordings under one directory
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `timeline` under a sanitized form of `name`, replacing any
    /// previous recording of the same name. Returns the name actually used;
    /// a name that sanitizes to nothing gets a time-derived one.
    pub fn persist(&self, name: &str, timeline: &Timeline) -> Result<String> {
        let safe_name = match sanitize(name) {
            Some(safe) => safe,
            None => chrono::Utc::now().format("capture-%Y%m%d-%H%M%S").to_string(),
        };

        let records = records_from_timeline(timeline);
        let contents = serde_json::to_vec_pretty(&records)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let path = self.path_for(&safe_name);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        info!(
            "persisted recording '{}' ({} events) to {:?}",
            safe_name,
            timeline.len(),
            path
        );
        Ok(safe_name)
    }

    /// Load the recording persisted under `name`
    pub fn load(&self, name: &str) -> Result<Timeline> {
        let safe_name = sanitize(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let path = self.path_for(&safe_name);
        if !path.exists() {
            return Err(Error::NotFound(safe_name));
        }

        let contents = fs::read_to_string(&path)?;
        let records: Vec<EventRecord> =
            serde_json::from_str(&contents).map_err(|e| Error::Corrupt {
                name: safe_name.clone(),
                detail: e.to_string(),
            })?;

        let timeline = timeline_from_records(&safe_name, &records)?;
        debug!("loaded recording '{}' ({} events)", safe_name, timeline.len());
        Ok(timeline)
    }

    /// Whether a recording is already persisted under `name`
    pub fn exists(&self, name: &str) -> bool {
        sanitize(name)
            .map(|safe| self.path_for(&safe).exists())
            .unwrap_or(false)
    }

    /// Names of all persisted recordings, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove the recording persisted under `name`
    pub fn delete(&self, name: &str) -> Result<()> {
        let safe_name = sanitize(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let path = self.path_for(&safe_name);
        if !path.exists() {
            return Err(Error::NotFound(safe_name));
        }
        fs::remove_file(&path)?;
        info!("deleted recording '{}'", safe_name);
        Ok(())
    }

    fn path_for(&self, safe_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, safe_name, FILE_SUFFIX))
    }
}

/// Keep alphanumeric characters, spaces, underscores and hyphens, and trim
/// trailing whitespace; `None` when nothing survives.
fn sanitize(name: &str) -> Option<String> {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let safe = safe.trim_end();
    if safe.is_empty() {
        None
    } else {
        Some(safe.to_string())
    }
}
