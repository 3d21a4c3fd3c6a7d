//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-user record store cache.

use crate::config::Config;
use attendance_core::ports::{
    AccountService, DocumentAnalysisService, KeyValueStore, TextExtractionService,
};
use attendance_core::{RecordStore, StoreKeys, TrackerResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A user's record store. The mutex serializes every mutation of that user's data.
pub type SharedStore = Arc<Mutex<RecordStore>>;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KeyValueStore>,
    pub accounts: Arc<dyn AccountService>,
    pub extractor: Arc<dyn TextExtractionService>,
    pub analyzer: Arc<dyn DocumentAnalysisService>,
    pub config: Arc<Config>,
    stores: Arc<Mutex<HashMap<String, SharedStore>>>,
}

impl AppState {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        accounts: Arc<dyn AccountService>,
        extractor: Arc<dyn TextExtractionService>,
        analyzer: Arc<dyn DocumentAnalysisService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            kv,
            accounts,
            extractor,
            analyzer,
            config,
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the user's record store, loading it from the key-value store on first use.
    ///
    /// The cache lock is not held while loading, so a slow load for one user does not
    /// block other users. If two requests race to load the same user, the first insert wins.
    pub async fn store_for(&self, username: &str) -> TrackerResult<SharedStore> {
        if let Some(store) = self.stores.lock().await.get(username) {
            return Ok(store.clone());
        }

        let store = RecordStore::load(self.kv.clone(), StoreKeys::for_user(username)).await?;
        debug!(
            username,
            events = store.event_count(),
            attendance = store.attendance_count(),
            "Loaded record store"
        );

        let mut stores = self.stores.lock().await;
        let store = stores
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(store)));
        Ok(store.clone())
    }
}
