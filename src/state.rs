use std::sync::Arc;

use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, jwt_secret: impl Into<String>) -> Self {
        Self {
            storage,
            jwt_secret: jwt_secret.into(),
        }
    }
}
