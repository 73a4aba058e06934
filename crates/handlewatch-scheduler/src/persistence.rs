//! Whole-file JSON snapshots, written through a temp file and an atomic rename.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use handlewatch_schema::{PersistedRecord, StatusRecord, SubscriberId, Target};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub const STATUS_FILE_NAME: &str = "last_status.json";
pub const WATCHLIST_FILE_NAME: &str = "watchlist.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub type StatusSnapshot = HashMap<Target, StatusRecord>;
pub type WatchlistSnapshot = BTreeMap<SubscriberId, Vec<Target>>;

fn temp_path_for(path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    }
}

/// Stages `payload` next to `path` and renames it into place, so readers see
/// either the old or the new snapshot, never a torn one.
pub async fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let temp_path = temp_path_for(path);
    let mut file = tokio::fs::File::create(&temp_path).await.map_err(write_err)?;
    file.write_all(payload).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Names in older snapshots were stored unvalidated; an entry that no longer
/// parses is skipped rather than failing the whole load.
fn parse_entry(path: &Path, raw: &str) -> Option<Target> {
    match Target::parse(raw) {
        Ok(target) => Some(target),
        Err(err) => {
            warn!(
                entry = raw,
                path = %path.display(),
                error = %err,
                "skipping unusable snapshot entry"
            );
            None
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Target → `{confirmed, pending}` snapshot.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(data_dir: &Path) -> Self {
        Self::at(data_dir.join(STATUS_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty snapshot. Bare legacy tags are upgraded to
    /// the pair form here; the upgraded form is written on the next save.
    pub fn load(&self) -> Result<StatusSnapshot, StoreError> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(HashMap::new());
        };

        let raw: BTreeMap<String, PersistedRecord> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut legacy = 0;
        let mut records: HashMap<Target, (bool, StatusRecord)> = HashMap::with_capacity(raw.len());
        for (name, record) in raw {
            let Some(target) = parse_entry(&self.path, &name) else {
                continue;
            };
            let bare = matches!(record, PersistedRecord::Bare(_));
            if bare {
                legacy += 1;
            }
            // Names that normalize to the same target keep the pair form if
            // either spelling has one.
            match records.entry(target) {
                Entry::Vacant(slot) => {
                    slot.insert((bare, record.into()));
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().0 && !bare {
                        slot.insert((bare, record.into()));
                    }
                }
            }
        }

        if legacy > 0 {
            info!(
                count = legacy,
                path = %self.path.display(),
                "upgraded legacy status records"
            );
        }

        Ok(records
            .into_iter()
            .map(|(target, (_, record))| (target, record))
            .collect())
    }

    pub async fn save(&self, records: &StatusSnapshot) -> Result<(), StoreError> {
        let ordered: BTreeMap<&Target, &StatusRecord> = records.iter().collect();
        let json = serde_json::to_vec_pretty(&ordered)?;
        write_atomic(&self.path, &json).await
    }
}

/// Subscriber → watched targets snapshot.
pub struct WatchlistFile {
    path: PathBuf,
}

impl WatchlistFile {
    pub fn new(data_dir: &Path) -> Self {
        Self::at(data_dir.join(WATCHLIST_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<WatchlistSnapshot, StoreError> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(BTreeMap::new());
        };

        let raw: BTreeMap<SubscriberId, Vec<String>> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut watchlists = WatchlistSnapshot::new();
        for (subscriber, names) in raw {
            // Names normalized on load may collide ("Alice" and "alice").
            let mut seen = HashSet::new();
            let targets: Vec<Target> = names
                .iter()
                .filter_map(|name| parse_entry(&self.path, name))
                .filter(|target| seen.insert(target.clone()))
                .collect();
            if !targets.is_empty() {
                watchlists.insert(subscriber, targets);
            }
        }
        Ok(watchlists)
    }

    pub async fn save(&self, watchlists: &WatchlistSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(watchlists)?;
        write_atomic(&self.path, &json).await
    }
}
