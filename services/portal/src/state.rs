use std::sync::Arc;
use tokio::sync::RwLock;

use catalog::CatalogStore;

use crate::config::AppConfig;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub catalog: Arc<RwLock<CatalogStore>>,
    pub cfg: AppConfig,
}

impl AppState {
    pub fn new(store: CatalogStore, cfg: AppConfig) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(store)),
            cfg,
        }
    }
}
