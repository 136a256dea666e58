use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::config::AuthConfig;
use crate::media::storage::FileStore;

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<dyn FileStore>,
    /// Directory served under `/media`.
    pub media_root: PathBuf,
    pub auth_config: AuthConfig,
    /// Upload size limit in bytes.
    pub max_upload_bytes: usize,
}
