use std::sync::Arc;

use hindsight_core::github::DiffSource;
use hindsight_core::memory::ReviewMemory;
use hindsight_core::review::ReviewService;

#[derive(Clone)]
pub struct AppState {
    pub reviews: ReviewService,
    pub memory: ReviewMemory,
    pub diff_source: Arc<dyn DiffSource>,
}
