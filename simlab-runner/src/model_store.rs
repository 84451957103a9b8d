//! Versioned on-disk store for calibrated execution models.
//!
//! Layout: `<root>/<venue>/<calibrated_at>_<sample_size>.json`, with the
//! timestamp as `%Y%m%dT%H%M%SZ`. A version is written once and never
//! overwritten; recalibrating produces a new file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use simlab_core::execution::ExecutionModel;
use simlab_core::ConfigError;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("model for venue '{0}' has no calibration metadata and cannot be versioned")]
    Uncalibrated(String),
    #[error("model version already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("venue name '{0}' is not usable as a directory name")]
    InvalidVenue(String),
    #[error("no stored models for venue '{0}'")]
    NoVersions(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// A stored version, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModelVersion {
    /// `%Y%m%dT%H%M%SZ` timestamp, which sorts chronologically as text.
    pub calibrated_at: String,
    pub sample_size: usize,
    pub path: PathBuf,
}

pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn venue_dir(&self, venue: &str) -> Result<PathBuf, StoreError> {
        let usable = !venue.is_empty()
            && venue
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && venue != "."
            && venue != "..";
        if !usable {
            return Err(StoreError::InvalidVenue(venue.to_string()));
        }
        Ok(self.root.join(venue))
    }

    /// Path a model would be stored at.
    pub fn path_for(&self, model: &ExecutionModel) -> Result<PathBuf, StoreError> {
        let meta = model
            .calibration
            .as_ref()
            .ok_or_else(|| StoreError::Uncalibrated(model.venue.clone()))?;
        let name = format!(
            "{}_{}.json",
            meta.calibrated_at.format(TIMESTAMP_FORMAT),
            meta.sample_size
        );
        Ok(self.venue_dir(&model.venue)?.join(name))
    }

    /// Persist a calibrated model. Fails if this version already exists.
    pub fn save(&self, model: &ExecutionModel) -> Result<PathBuf, StoreError> {
        let path = self.path_for(model)?;
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(model).expect("ExecutionModel must serialize");
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(path.clone())
                } else {
                    StoreError::Io {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        info!(venue = %model.venue, path = %path.display(), "stored execution model");
        Ok(path)
    }

    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<ExecutionModel, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = ExecutionModel::from_json_str(&text).map_err(|source| StoreError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(venue = %model.venue, path = %path.display(), "loaded execution model");
        Ok(model)
    }

    /// Stored versions for `venue`, oldest first. Files that do not follow
    /// the naming scheme are ignored.
    pub fn versions(&self, venue: &str) -> Result<Vec<ModelVersion>, StoreError> {
        let dir = self.venue_dir(venue)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut versions: Vec<ModelVersion> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| parse_version(&path))
            .collect();
        versions.sort();
        Ok(versions)
    }

    pub fn latest(&self, venue: &str) -> Result<ExecutionModel, StoreError> {
        let newest = self
            .versions(venue)?
            .pop()
            .ok_or_else(|| StoreError::NoVersions(venue.to_string()))?;
        Self::load(&newest.path)
    }
}

fn parse_version(path: &Path) -> Option<ModelVersion> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (stamp, n) = stem.rsplit_once('_')?;
    chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some(ModelVersion {
        calibrated_at: stamp.to_string(),
        sample_size: n.parse().ok()?,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_names() {
        let v = parse_version(Path::new("/m/jupiter/20240301T120000Z_412.json")).unwrap();
        assert_eq!(v.calibrated_at, "20240301T120000Z");
        assert_eq!(v.sample_size, 412);
        assert!(parse_version(Path::new("/m/jupiter/notes.json")).is_none());
        assert!(parse_version(Path::new("/m/jupiter/20240301T120000Z_412.toml")).is_none());
        assert!(parse_version(Path::new("/m/jupiter/2024-03-01_412.json")).is_none());
    }

    #[test]
    fn versions_order_by_time_then_sample_size() {
        let a = parse_version(Path::new("20240301T120000Z_90.json")).unwrap();
        let b = parse_version(Path::new("20240301T120000Z_100.json")).unwrap();
        let c = parse_version(Path::new("20240302T000000Z_5.json")).unwrap();
        let mut v = vec![c.clone(), b.clone(), a.clone()];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn rejects_path_like_venues() {
        let store = ModelStore::new("/tmp/models");
        assert!(matches!(store.venue_dir("../etc"), Err(StoreError::InvalidVenue(_))));
        assert!(matches!(store.venue_dir(""), Err(StoreError::InvalidVenue(_))));
        assert!(store.venue_dir("jupiter-v6").is_ok());
    }

    #[test]
    fn uncalibrated_models_have_no_path() {
        let store = ModelStore::new("/tmp/models");
        assert!(matches!(
            store.path_for(&ExecutionModel::ideal("jupiter")),
            Err(StoreError::Uncalibrated(_))
        ));
    }
}
