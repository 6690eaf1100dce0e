use std::sync::Arc;

use crate::config::Config;
use crate::ocr::OcrProvider;
use crate::services::ScanService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scanner: ScanService,
}

impl AppState {
    pub fn new(config: Config, ocr: OcrProvider) -> Self {
        let scanner = ScanService::new(ocr, config.solver.clone());
        Self {
            config: Arc::new(config),
            scanner,
        }
    }
}
