pub mod common;
pub mod health;
pub mod products;

use crate::{
    db::DatabaseAccess, generation::DescriptionGenerator, metrics::MetricsRegistry,
    services::ProductService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
}

impl AppServices {
    /// Wire services from explicitly constructed collaborators.
    pub fn new(
        db: DatabaseAccess,
        generator: Arc<dyn DescriptionGenerator>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            products: Arc::new(ProductService::new(db, generator, metrics)),
        }
    }
}
