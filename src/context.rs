use std::sync::Arc;

use crate::adapters::VolumeAdapter;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub adapter: Arc<dyn VolumeAdapter>,
}

impl AppContext {
    pub fn new(config: AppConfig, adapter: Arc<dyn VolumeAdapter>) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
        }
    }
}
