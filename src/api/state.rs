//! Shared application state.

use std::sync::Arc;

use crate::database::MessageStore;
use crate::render::{MapRenderer, MarkerRenderer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: MessageStore,
    pub renderer: Arc<dyn MapRenderer>,
}

impl AppState {
    /// State with the built-in marker renderer.
    pub fn new(store: MessageStore) -> Self {
        Self::with_renderer(store, Arc::new(MarkerRenderer))
    }

    pub fn with_renderer(store: MessageStore, renderer: Arc<dyn MapRenderer>) -> Self {
        Self { store, renderer }
    }
}
