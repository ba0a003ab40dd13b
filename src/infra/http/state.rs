use std::sync::Arc;

use async_trait::async_trait;

use crate::application::catalog::CatalogServices;
use crate::application::pagination::{PageLimits, PageRequest};
use crate::application::repos::RepoError;

/// Backing-store liveness, surfaced at `/_health/db`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct ApiState {
    pub catalog: CatalogServices,
    pub page_limits: PageLimits,
    pub health: Arc<dyn HealthProbe>,
}

impl ApiState {
    pub fn new(
        catalog: CatalogServices,
        page_limits: PageLimits,
        health: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            catalog,
            page_limits,
            health,
        }
    }

    pub fn page(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        self.page_limits.request(page, page_size)
    }
}
