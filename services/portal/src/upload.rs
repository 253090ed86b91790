use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use catalog::{is_allowed_extension, stored_file_name, CatalogEntry, CatalogStore, NewEntry, Platform};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog_exec::with_catalog_blocking;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: CatalogEntry,
}

/// Owns a `.part` staging file and removes it on drop unless disarmed.
/// Covers request futures dropped mid-stream as well as error returns.
struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

struct StagedFile {
    guard: StagingGuard,
    original_name: String,
    size: u64,
    checksum: String,
}

#[derive(Default)]
struct UploadForm {
    file: Option<StagedFile>,
    platform: Option<String>,
    version: Option<String>,
}

/// `POST /api/admin/downloads` (multipart: `file`, `platform`, `version`).
pub async fn post_download(
    State(state): State<SharedState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    tokio::fs::create_dir_all(&state.cfg.staging_dir).await?;

    // Dropping `form` on any early return discards a staged file.
    let mut form = UploadForm::default();
    read_form(&mut mp, &state.cfg.staging_dir, state.cfg.max_upload_bytes, &mut form).await?;

    let platform = non_empty(form.platform.as_deref());
    let version = non_empty(form.version.as_deref());
    let (Some(platform), Some(version), Some(staged)) = (platform, version, form.file.take()) else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };
    let platform = Platform::parse(&platform)?;

    let entry = with_catalog_blocking(state.catalog.clone(), move |store| {
        place_and_record(store, staged, platform, version)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file: entry,
        }),
    ))
}

async fn read_form(
    mp: &mut Multipart,
    staging_dir: &Path,
    limit: u64,
    form: &mut UploadForm,
) -> Result<(), ApiError> {
    while let Some(mut field) = mp.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("platform") => form.platform = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?),
            Some("version") => form.version = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?),
            Some("file") => {
                let staged = stage_file(&mut field, staging_dir, limit).await?;
                // last file field wins; the previous one is dropped and removed
                form.file = Some(staged);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Stream one multipart field to `<staging>/<uuid>.part`, hashing as it goes.
async fn stage_file(field: &mut Field<'_>, staging_dir: &Path, limit: u64) -> Result<StagedFile, ApiError> {
    let original_name = field
        .file_name()
        .map(str::to_owned)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("file field has no file name".into()))?;

    if !is_allowed_extension(&original_name) {
        warn!(file = %original_name, "rejected upload with unsupported extension");
        return Err(ApiError::UnsupportedFileType);
    }

    let guard = StagingGuard::new(staging_dir.join(format!("{}.part", Uuid::new_v4())));
    let mut out = tokio::fs::File::create(guard.path()).await?;
    let mut hasher = blake3::Hasher::new();
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        size += chunk.len() as u64;
        if size > limit {
            warn!(file = %original_name, limit, "upload exceeded size limit");
            return Err(ApiError::PayloadTooLarge { limit });
        }
        hasher.update(&chunk);
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    out.sync_all().await?;

    Ok(StagedFile {
        guard,
        original_name,
        size,
        checksum: hex::encode(hasher.finalize().as_bytes()),
    })
}

/// Move the staged file into its platform directory under a fresh name and
/// record it. Runs under the catalog lock, so name selection cannot race
/// another upload. Nothing is left behind if the add fails.
fn place_and_record(
    store: &mut CatalogStore,
    mut staged: StagedFile,
    platform: Platform,
    version: String,
) -> Result<CatalogEntry, ApiError> {
    store.init()?;
    let dir = store.base_dir().join(platform.dir_name());

    let mut ts = chrono::Utc::now().timestamp_millis();
    let (file_name, path) = loop {
        let name = stored_file_name(&staged.original_name, &version, ts);
        let candidate = dir.join(&name);
        if !candidate.exists() {
            break (name, candidate);
        }
        ts += 1;
    };

    move_file(staged.guard.path(), &path)?;
    staged.guard.disarm();

    let new = NewEntry {
        platform: platform.dir_name().to_string(),
        version,
        file_name,
        file_size: staged.size,
        checksum: Some(staged.checksum),
    };
    match store.add(new) {
        Ok(entry) => {
            info!(id = %entry.id, file = %entry.file_name, "upload stored");
            Ok(entry)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&path);
            Err(e.into())
        }
    }
}

/// Rename, falling back to copy + delete when the staging dir sits on another filesystem.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}
