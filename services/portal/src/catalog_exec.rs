use std::sync::Arc;

use catalog::CatalogStore;
use tokio::sync::RwLock;
use tracing::error;

use crate::error::ApiError;

/// Run a catalog operation on the blocking pool while holding the write lock.
///
/// Every catalog operation goes through here, including `list` (it may write
/// back a pruned index), so read-modify-write cycles on the index never overlap.
/// Operation errors and a panicked or cancelled task both come back as `ApiError`.
pub async fn with_catalog_blocking<R, E, F>(
    catalog: Arc<RwLock<CatalogStore>>,
    f: F,
) -> Result<R, ApiError>
where
    R: Send + 'static,
    E: Into<ApiError> + Send + 'static,
    F: FnOnce(&mut CatalogStore) -> Result<R, E> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let mut guard = catalog.blocking_write();
        f(&mut *guard)
    })
    .await;

    match joined {
        Ok(res) => res.map_err(Into::into),
        Err(e) if e.is_panic() => {
            error!(error = %e, "catalog task panicked");
            Err(ApiError::Internal(format!("catalog task panicked: {e}")))
        }
        Err(e) => Err(ApiError::Internal(format!("catalog task cancelled: {e}"))),
    }
}
