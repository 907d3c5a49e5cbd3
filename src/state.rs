use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::CenterInfo;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Option<Database>,
    pub info: Arc<CenterInfo>,
    pub database_url_set: bool,
    pub database_name_set: bool,
}

impl AppState {
    pub fn new(config: &Config, db: Option<Database>) -> Self {
        AppState {
            db,
            info: Arc::new(CenterInfo::jesenca_pozeg()),
            database_url_set: config.database_url.is_some(),
            database_name_set: config.database_name.is_some(),
        }
    }

    /// The storage handle, or an error when the process runs without one.
    pub fn db(&self) -> Result<&Database, AppError> {
        self.db.as_ref().ok_or(AppError::StorageUnavailable)
    }
}
