//! Shared state handed to every request handler

use crate::analytics::AnalyticsService;
use crate::config::AppConfig;
use crate::markup::{tracker_script_url, MarkupQuery};
use crate::optimizer::Optimizer;
use crate::services::{ContentGenerator, WebsiteService};
use crate::storage::SiteStore;
use std::sync::Arc;

/// Services behind the HTTP surface
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SiteStore>,
    pub analytics: AnalyticsService,
    pub websites: WebsiteService,
    pub optimizer: Arc<Optimizer>,
    pub instance_id: String,
}

impl AppState {
    /// Wire the services over one store, generator and markup query
    pub fn new(
        store: Arc<dyn SiteStore>,
        generator: Arc<dyn ContentGenerator>,
        query: Arc<dyn MarkupQuery>,
        config: &AppConfig,
    ) -> Self {
        let tracker_url = tracker_script_url(&config.server.public_base_url);
        let analytics = AnalyticsService::new(store.clone());
        let websites = WebsiteService::new(store.clone(), generator.clone(), tracker_url.clone());
        let optimizer = Arc::new(Optimizer::new(
            store.clone(),
            generator,
            query,
            config.optimizer.clone(),
            tracker_url,
        ));

        Self {
            store,
            analytics,
            websites,
            optimizer,
            instance_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
        }
    }
}
