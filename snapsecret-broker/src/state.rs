use std::sync::Arc;

use snapsecret_core::SnapSecretEngine;

use crate::store::ConfiguredStore;

pub type SharedEngine = Arc<SnapSecretEngine<ConfiguredStore>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
}

impl AppState {
    pub fn new(engine: SnapSecretEngine<ConfiguredStore>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
