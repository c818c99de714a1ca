//! In-memory storage backend
//!
//! Used when no persistent database is reachable and as an isolated store in
//! tests. State lives in the instance, never in a process-wide singleton.

use crate::error::Result;
use crate::storage::SiteStore;
use crate::types::{InteractionEvent, Site};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    sites: HashMap<String, Site>,
    interactions: Vec<InteractionEvent>,
}

/// In-memory store with the same contract as the libSQL backend
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sites
    pub async fn site_count(&self) -> usize {
        self.inner.read().await.sites.len()
    }

    /// Number of stored interaction events across all sites
    pub async fn interaction_count(&self) -> usize {
        self.inner.read().await.interactions.len()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_site(&self, site_id: &str) -> Result<Option<Site>> {
        let inner = self.inner.read().await;
        Ok(inner.sites.get(site_id).cloned())
    }

    async fn put_site(&self, site: &Site) -> Result<()> {
        debug!("Storing site in memory: {}", site.site_id);
        let mut inner = self.inner.write().await;
        inner.sites.insert(site.site_id.clone(), site.clone());
        Ok(())
    }

    async fn find_latest_derived(&self, original_id: &str) -> Result<Option<Site>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sites
            .values()
            .filter(|s| s.parent_site_id.as_deref() == Some(original_id))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.site_id.cmp(&b.site_id))
            })
            .cloned())
    }

    async fn count_derived(&self, original_id: &str) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .sites
            .values()
            .filter(|s| s.parent_site_id.as_deref() == Some(original_id))
            .count())
    }

    async fn record_view(&self, site_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(site) = inner.sites.get_mut(site_id) {
            site.view_count += 1;
            site.last_accessed_at = at;
        }
        Ok(())
    }

    async fn increment_clicks(&self, site_id: &str) -> Result<Option<u64>> {
        let mut inner = self.inner.write().await;
        Ok(inner.sites.get_mut(site_id).map(|site| {
            site.click_count += 1;
            site.click_count
        }))
    }

    async fn list_interactions(&self, site_id: &str) -> Result<Vec<InteractionEvent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .interactions
            .iter()
            .filter(|e| e.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn append_interaction(&self, event: &InteractionEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.interactions.push(event.clone());
        Ok(())
    }

    async fn delete_interactions(&self, site_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.interactions.len();
        inner.interactions.retain(|e| e.site_id != site_id);
        Ok(before - inner.interactions.len())
    }
}
