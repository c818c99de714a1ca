//! Storage layer for sites and interaction events
//!
//! Provides the `SiteStore` abstraction with two interchangeable backends:
//! a persistent libSQL store and an in-memory fallback used when the
//! persistent backend is unavailable (and in tests).

pub mod libsql;
pub mod memory;

use crate::error::Result;
use crate::types::{InteractionEvent, Site};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::libsql::{ConnectionMode, LibsqlStore};
pub use self::memory::MemoryStore;

/// Storage backend trait defining all required operations
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Short backend name for diagnostics
    fn backend_name(&self) -> &'static str;

    /// Retrieve a site by id
    async fn get_site(&self, site_id: &str) -> Result<Option<Site>>;

    /// Insert or replace a site record
    async fn put_site(&self, site: &Site) -> Result<()>;

    /// Most recently created site whose parent is `original_id`
    async fn find_latest_derived(&self, original_id: &str) -> Result<Option<Site>>;

    /// Number of derived sites whose parent is `original_id`
    async fn count_derived(&self, original_id: &str) -> Result<usize>;

    /// Increment the view counter and stamp the access time
    async fn record_view(&self, site_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Increment the click counter, returning the new value
    /// (`None` when the site is unknown)
    async fn increment_clicks(&self, site_id: &str) -> Result<Option<u64>>;

    /// All interaction events for a site, in append order
    async fn list_interactions(&self, site_id: &str) -> Result<Vec<InteractionEvent>>;

    /// Append one interaction event
    async fn append_interaction(&self, event: &InteractionEvent) -> Result<()>;

    /// Delete all interaction events for a site, returning how many were removed
    async fn delete_interactions(&self, site_id: &str) -> Result<usize>;
}
