use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::store::CatalogError;

/// Installer category. Each one owns a subdirectory under the catalog base dir.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "client")]
    Client,
    #[serde(rename = "launcher")]
    Launcher,
    /// Core support package, published as `luminacore`.
    #[serde(rename = "luminacore")]
    CorePackage,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Client, Platform::Launcher, Platform::CorePackage];

    pub fn dir_name(self) -> &'static str {
        match self {
            Platform::Client => "client",
            Platform::Launcher => "launcher",
            Platform::CorePackage => "luminacore",
        }
    }

    /// Case-insensitive parse of the wire name.
    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        let norm = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.dir_name() == norm)
            .ok_or_else(|| CatalogError::Validation(format!("invalid platform: {s}")))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub platform: Platform,
    pub version: String,
    pub file_name: String,          // name inside <base>/<platform>/
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,   // BLAKE3 hex of the stored file
    /// Fields written by other tools (e.g. `download_url`), carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input to `CatalogStore::add`. Fields are raw and validated by the store.
#[derive(Clone, Debug, Default)]
pub struct NewEntry {
    pub platform: String,
    pub version: String,
    pub file_name: String,
    pub file_size: u64,
    pub checksum: Option<String>,
}
