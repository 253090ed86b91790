//! The download catalog: installer binaries grouped by platform under a base
//! directory, described by a single JSON index (`metadata.json`).
//!
//! The index is the source of truth. The filesystem is only consulted as a
//! negative check: an entry whose file is gone is dropped on the next `list`.
//! Every write replaces the whole index through a temp file + rename, so a
//! reader sees either the old or the new array, never a torn one.
//!
//! The store does no locking of its own. Callers share it behind a single
//! write lock so read-modify-write cycles cannot interleave.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{CatalogEntry, NewEntry, Platform};

pub const INDEX_FILE: &str = "metadata.json";
const INDEX_TMP_FILE: &str = "metadata.json.tmp";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<io::Error> for CatalogError {
    fn from(e: io::Error) -> Self {
        CatalogError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

pub struct CatalogStore {
    base_dir: PathBuf,
    index_path: PathBuf,
    last_issued_id: u64,
    fallback_seq: u64,
}

impl CatalogStore {
    /// Open (and initialize) the catalog rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let store = Self {
            index_path: base_dir.join(INDEX_FILE),
            base_dir,
            last_issued_id: 0,
            fallback_seq: 0,
        };
        store.init()?;
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Ensure the platform directories and the index file exist.
    /// Idempotent; runs at the start of every operation.
    pub fn init(&self) -> Result<()> {
        for p in Platform::ALL {
            fs::create_dir_all(self.base_dir.join(p.dir_name()))?;
        }
        if !self.index_path.exists() {
            self.save_index(&[])?;
        }
        Ok(())
    }

    /// Location of an entry's backing file. `None` if the stored name is not a
    /// single plain path component (a hand-edited index, for example).
    pub fn entry_path(&self, entry: &CatalogEntry) -> Option<PathBuf> {
        is_plain_component(&entry.file_name)
            .then(|| self.base_dir.join(entry.platform.dir_name()).join(&entry.file_name))
    }

    /// All entries whose backing file exists, in stored order.
    /// Entries with a missing file, or records that do not decode, are pruned
    /// and the index is written back.
    pub fn list(&mut self) -> Result<Vec<CatalogEntry>> {
        self.init()?;
        let (entries, skipped) = self.load_index()?;
        let total = entries.len();

        let valid: Vec<CatalogEntry> = entries
            .into_iter()
            .filter(|e| {
                let present = self.entry_path(e).is_some_and(|p| p.is_file());
                if !present {
                    info!(id = %e.id, platform = %e.platform, file = %e.file_name, "pruning catalog entry with missing file");
                }
                present
            })
            .collect();

        if valid.len() != total || skipped > 0 {
            self.save_index(&valid)?;
        }
        Ok(valid)
    }

    /// Record a file the upload handler already placed in its platform directory.
    pub fn add(&mut self, new: NewEntry) -> Result<CatalogEntry> {
        let platform = Platform::parse(&new.platform)?;

        let version = new.version.trim();
        if version.is_empty() {
            return Err(CatalogError::Validation("version is required".into()));
        }
        let file_name = new.file_name.trim();
        if file_name.is_empty() {
            return Err(CatalogError::Validation("file name is required".into()));
        }
        if !is_plain_component(file_name) {
            return Err(CatalogError::Validation(format!("invalid file name: {file_name}")));
        }

        self.init()?;
        let path = self.base_dir.join(platform.dir_name()).join(file_name);
        if !path.is_file() {
            return Err(CatalogError::Validation(format!(
                "file {file_name} not found for platform {platform}"
            )));
        }

        let (mut entries, _) = self.load_index()?;
        let id = self.next_id(&entries);
        let entry = CatalogEntry {
            id,
            platform,
            version: version.to_string(),
            file_name: file_name.to_string(),
            file_size: new.file_size,
            uploaded_at: Utc::now(),
            is_active: true,
            checksum: new.checksum,
            extra: Default::default(),
        };
        entries.push(entry.clone());
        self.save_index(&entries)?;

        info!(id = %entry.id, platform = %entry.platform, version = %entry.version, size = entry.file_size, "catalog entry added");
        Ok(entry)
    }

    /// Delete an entry and its backing file. A file that is already gone is
    /// not an error; any other filesystem failure leaves the index untouched.
    pub fn remove(&mut self, id: &str) -> Result<CatalogEntry> {
        self.init()?;
        let (mut entries, _) = self.load_index()?;
        let pos = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CatalogError::NotFound(format!("download {id} not found")))?;

        if let Some(path) = self.entry_path(&entries[pos]) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(id, path = %path.display(), "backing file already absent");
                }
                Err(e) => {
                    return Err(CatalogError::Storage(format!(
                        "failed to delete {}: {e}",
                        path.display()
                    )))
                }
            }
        }

        let removed = entries.remove(pos);
        self.save_index(&entries)?;

        info!(id = %removed.id, platform = %removed.platform, version = %removed.version, "catalog entry removed");
        Ok(removed)
    }

    /// Show or hide an entry without deleting it.
    pub fn set_active(&mut self, id: &str, active: bool) -> Result<CatalogEntry> {
        self.init()?;
        let (mut entries, _) = self.load_index()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CatalogError::NotFound(format!("download {id} not found")))?;

        entry.is_active = active;
        let updated = entry.clone();
        self.save_index(&entries)?;

        info!(id, active, "catalog entry visibility changed");
        Ok(updated)
    }

    /// Newest active entry per platform. On equal timestamps the first-stored entry wins.
    pub fn latest_per_platform(&mut self) -> Result<BTreeMap<Platform, CatalogEntry>> {
        let mut latest: BTreeMap<Platform, CatalogEntry> = BTreeMap::new();
        for e in self.list()? {
            if !e.is_active {
                continue;
            }
            let newer = latest
                .get(&e.platform)
                .map_or(true, |cur| e.uploaded_at > cur.uploaded_at);
            if newer {
                latest.insert(e.platform, e);
            }
        }
        Ok(latest)
    }

    /// Decoded entries plus the number of records that were skipped because
    /// they do not decode. Only a file that is not a JSON array is an error.
    fn load_index(&self) -> Result<(Vec<CatalogEntry>, usize)> {
        let raw = fs::read_to_string(&self.index_path).map_err(|e| {
            CatalogError::Storage(format!("failed to read {}: {e}", self.index_path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok((vec![], 0));
        }
        let records: Vec<Value> = serde_json::from_str(&raw).map_err(|e| {
            CatalogError::Storage(format!("failed to parse {}: {e}", self.index_path.display()))
        })?;

        let mut entries = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for (i, rec) in records.into_iter().enumerate() {
            let id = rec.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
            match serde_json::from_value::<CatalogEntry>(rec) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(index = i, id = %id, error = %e, "skipping undecodable catalog record");
                    skipped += 1;
                }
            }
        }
        Ok((entries, skipped))
    }

    fn save_index(&self, entries: &[CatalogEntry]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.base_dir.join(INDEX_TMP_FILE);
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }

    /// Millisecond timestamp, bumped past every id already handed out so two
    /// adds inside the same millisecond still get distinct ids.
    ///
    /// Once the numeric space is exhausted (an index holding `u64::MAX`), ids
    /// become `<now>-<seq>`, checked against the ids currently in the index.
    fn next_id(&mut self, entries: &[CatalogEntry]) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let newest = entries
            .iter()
            .filter_map(|e| e.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            .max(self.last_issued_id);

        let next = if now > newest { Some(now) } else { newest.checked_add(1) };
        if let Some(id) = next {
            self.last_issued_id = id;
            return id.to_string();
        }

        let taken: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        loop {
            self.fallback_seq += 1;
            let id = format!("{now}-{}", self.fallback_seq);
            if !taken.contains(id.as_str()) {
                return id;
            }
        }
    }
}

fn is_plain_component(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
        && !name.contains('\\')
}
