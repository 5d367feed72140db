pub mod common;
pub mod quotes;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::pricing::DbPricingCatalog;
use crate::services::quotes::QuoteService;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub quotes: Arc<QuoteService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let catalog = Arc::new(DbPricingCatalog::new(db_pool.clone()));
        let quotes = Arc::new(QuoteService::new(db_pool, catalog, Some(event_sender)));
        Self { quotes }
    }
}
