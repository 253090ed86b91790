use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use catalog::{CatalogEntry, Platform};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::catalog_exec::with_catalog_blocking;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SetActiveReq {
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct MessageResp {
    pub message: String,
}

/// Listing never fails the request: a broken index is logged and served as empty.
async fn list_or_empty(state: &SharedState) -> Vec<CatalogEntry> {
    match with_catalog_blocking(state.catalog.clone(), |store| store.list()).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(error = ?e, "failed to list catalog");
            vec![]
        }
    }
}

/// Public listing: active entries, newest first.
pub async fn get_downloads(State(state): State<SharedState>) -> Json<Vec<CatalogEntry>> {
    let mut entries: Vec<CatalogEntry> = list_or_empty(&state)
        .await
        .into_iter()
        .filter(|e| e.is_active)
        .collect();
    entries.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    Json(entries)
}

pub async fn get_latest(State(state): State<SharedState>) -> Json<BTreeMap<Platform, CatalogEntry>> {
    let latest = match with_catalog_blocking(state.catalog.clone(), |store| store.latest_per_platform()).await {
        Ok(latest) => latest,
        Err(e) => {
            error!(error = ?e, "failed to resolve latest downloads");
            BTreeMap::new()
        }
    };
    Json(latest)
}

/// Admin listing: every entry with a file on disk, hidden ones included, in stored order.
pub async fn get_admin_downloads(State(state): State<SharedState>) -> Json<Vec<CatalogEntry>> {
    Json(list_or_empty(&state).await)
}

pub async fn patch_download(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<SetActiveReq>,
) -> Result<Json<CatalogEntry>, ApiError> {
    let entry = with_catalog_blocking(state.catalog.clone(), move |store| {
        store.set_active(&id, req.is_active)
    })
    .await?;
    Ok(Json(entry))
}

pub async fn delete_download(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResp>, ApiError> {
    with_catalog_blocking(state.catalog.clone(), move |store| store.remove(&id)).await?;
    Ok(Json(MessageResp {
        message: "File deleted successfully".to_string(),
    }))
}
