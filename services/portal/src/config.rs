use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub downloads_dir: PathBuf,
    pub staging_dir: PathBuf,     // in-flight uploads; kept outside the served tree
    pub admin_token: String,
    pub max_upload_bytes: u64,
}

impl AppConfig {
    pub fn new(downloads_dir: impl Into<PathBuf>, admin_token: impl Into<String>) -> Self {
        let downloads_dir = downloads_dir.into();
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            staging_dir: default_staging_dir(&downloads_dir),
            downloads_dir,
            admin_token: admin_token.into(),
            max_upload_bytes: catalog::MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("PORTAL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let downloads_dir = std::env::var("DOWNLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public/downloads"));
        let staging_dir = std::env::var("UPLOAD_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_staging_dir(&downloads_dir));
        let admin_token = get("PORTAL_ADMIN_TOKEN")?;

        let max_upload_bytes = match std::env::var("PORTAL_MAX_UPLOAD_BYTES") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PORTAL_MAX_UPLOAD_BYTES is not a byte count: {v}"))?,
            Err(_) => catalog::MAX_UPLOAD_BYTES,
        };

        // fail fast, fail loud
        if admin_token.trim().len() < 16 {
            bail!("PORTAL_ADMIN_TOKEN must be at least 16 characters");
        }
        if max_upload_bytes == 0 {
            bail!("PORTAL_MAX_UPLOAD_BYTES must be greater than zero");
        }

        Ok(Self {
            bind_addr,
            downloads_dir,
            staging_dir,
            admin_token: admin_token.trim().to_string(),
            max_upload_bytes,
        })
    }
}

/// Sibling of the downloads dir, so partial uploads are never served and
/// finished ones can be renamed into place on the same filesystem.
fn default_staging_dir(downloads_dir: &Path) -> PathBuf {
    match downloads_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(".upload-staging"),
        _ => PathBuf::from(".upload-staging"),
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}
