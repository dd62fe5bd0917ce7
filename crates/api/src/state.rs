//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::ids::{IdError, IdGenerator};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Arc<dyn Store>,
    ids: IdGenerator,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `store` - storage backend (`PgStore` in production)
    ///
    /// # Errors
    ///
    /// Returns an error if the configured node id is out of range.
    pub fn new(config: ApiConfig, store: Arc<dyn Store>) -> Result<Self, IdError> {
        let ids = IdGenerator::new(config.node_id)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, store, ids }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the id generator.
    #[must_use]
    pub fn ids(&self) -> &IdGenerator {
        &self.inner.ids
    }
}
