use crate::models::AppData;
use crate::storage::FileStore;
use crate::sync::CompletionStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single writer over the activity list and completion map; every mutation
/// holds the lock across its save.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CompletionStore<FileStore>>,
    pub data: Arc<Mutex<AppData>>,
}

impl AppState {
    pub fn new(store: CompletionStore<FileStore>, data: AppData) -> Self {
        Self {
            store: Arc::new(store),
            data: Arc::new(Mutex::new(data)),
        }
    }
}
