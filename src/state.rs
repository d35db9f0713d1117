use std::sync::Arc;

use crate::config::AppConfig;
use crate::extractor::Extractor;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub extractor: Arc<dyn Extractor>,
}
