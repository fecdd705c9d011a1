use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::backend::TestBackend;
use crate::config::Config;
use crate::resume::ResumeExtractor;
use crate::scoring::ScoringPipeline;
use crate::session::controller::SessionController;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub pipeline: ScoringPipeline,
    /// Test catalog as seen by candidates. Default: PgTestBackend.
    pub backend: Arc<dyn TestBackend>,
    pub extractor: Arc<dyn ResumeExtractor>,
    pub controller: SessionController,
}
