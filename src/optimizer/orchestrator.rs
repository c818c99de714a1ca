//! Optimization orchestrator
//!
//! Gates optimization requests (click threshold, insufficient data, cooldown,
//! force override), builds the generation request, invokes the content
//! generator under a timeout, reconciles protected sections and persists the
//! result as a new derived site. A failed run never touches the original
//! site and persists nothing.

use crate::analytics::{aggregate_click_elements, aggregate_heatmap};
use crate::config::OptimizerConfig;
use crate::error::{HeatforgeError, Result};
use crate::markup::{build_preview_document, extract_code_blocks, MarkupQuery};
use crate::optimizer::prompt::OptimizationRequest;
use crate::optimizer::state::{CooldownTracker, OptimizationState, SkipReason, StatusBoard};
use crate::protection::{identify, reconcile, Reconciliation};
use crate::services::ContentGenerator;
use crate::storage::SiteStore;
use crate::types::{ClickElement, HeatmapPoint, Site};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of an optimization request that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OptimizationOutcome {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        original_site_id: String,
        optimized_site_id: String,

        /// Protected sections restored into the generated markup
        restored_sections: Vec<String>,

        /// Generated markup was discarded in favor of the original
        fell_back_to_original: bool,
    },

    Skipped { reason: SkipReason, message: String },
}

impl OptimizationOutcome {
    pub fn optimized_site_id(&self) -> Option<&str> {
        match self {
            OptimizationOutcome::Succeeded {
                optimized_site_id, ..
            } => Some(optimized_site_id),
            OptimizationOutcome::Skipped { .. } => None,
        }
    }
}

/// Whether a click counter sits on an exact positive multiple of `threshold`
pub fn is_threshold_hit(click_count: u64, threshold: u64) -> bool {
    threshold > 0 && click_count > 0 && click_count % threshold == 0
}

/// Orchestrates heatmap-driven optimization for every site in a store
///
/// All mutable state (cooldowns, last states) lives in the instance, so
/// independent optimizers never share bookkeeping. Clones share it.
#[derive(Clone)]
pub struct Optimizer {
    store: Arc<dyn SiteStore>,
    generator: Arc<dyn ContentGenerator>,
    query: Arc<dyn MarkupQuery>,
    config: OptimizerConfig,
    tracker_url: String,
    cooldown: CooldownTracker,
    status: StatusBoard,
}

impl Optimizer {
    pub fn new(
        store: Arc<dyn SiteStore>,
        generator: Arc<dyn ContentGenerator>,
        query: Arc<dyn MarkupQuery>,
        config: OptimizerConfig,
        tracker_url: impl Into<String>,
    ) -> Self {
        let cooldown = CooldownTracker::new(config.cooldown);
        Self {
            store,
            generator,
            query,
            config,
            tracker_url: tracker_url.into(),
            cooldown,
            status: StatusBoard::new(),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Last observed state for a site (`Idle` if never requested)
    pub async fn status(&self, site_id: &str) -> OptimizationState {
        self.status.get(site_id).await
    }

    async fn transition(&self, site_id: &str, next: OptimizationState) {
        let previous = self.status.get(site_id).await;
        if !previous.can_transition_to(&next) {
            debug!(
                "Optimization state for {} jumped from {} to {}",
                site_id,
                previous.name(),
                next.name()
            );
        }
        match &next {
            OptimizationState::Skipped { reason, message } => {
                info!("Optimization skipped for {} ({}): {}", site_id, reason, message)
            }
            OptimizationState::Failed { error } => {
                error!("Optimization failed for {}: {}", site_id, error)
            }
            state => info!("Optimization {} for {}", state.name(), site_id),
        }
        self.status.set(site_id, next).await;
    }

    /// Whether a click counter value should start an automatic optimization
    ///
    /// True when the counter hits an exact multiple of the threshold and the
    /// site's original has no optimized derivative yet.
    pub async fn trigger_state(&self, site_id: &str, click_count: u64) -> Result<OptimizationState> {
        if !is_threshold_hit(click_count, self.config.click_threshold) {
            return Ok(OptimizationState::Idle);
        }

        let Some(site) = self.store.get_site(site_id).await? else {
            return Ok(OptimizationState::Idle);
        };
        if self.store.count_derived(site.root_id()).await? > 0 {
            return Ok(OptimizationState::Idle);
        }
        Ok(OptimizationState::Eligible)
    }

    /// Apply the insufficient-data and cooldown guards
    ///
    /// Returns `Eligible` or `Skipped`. Both guards are bypassed when forced.
    pub async fn evaluate(
        &self,
        site: &Site,
        distinct_points: usize,
        force: bool,
        now: DateTime<Utc>,
    ) -> OptimizationState {
        if force {
            return OptimizationState::Eligible;
        }

        if distinct_points < self.config.min_heatmap_points {
            return OptimizationState::Skipped {
                reason: SkipReason::InsufficientData,
                message: format!(
                    "Need at least {} distinct click points, have {}",
                    self.config.min_heatmap_points, distinct_points
                ),
            };
        }

        if let Some(remaining) = self.cooldown.remaining(site.root_id(), now).await {
            return OptimizationState::Skipped {
                reason: SkipReason::Cooldown,
                message: format!(
                    "Site {} was optimized recently; retry in {} seconds",
                    site.root_id(),
                    remaining.as_secs().max(1)
                ),
            };
        }

        OptimizationState::Eligible
    }

    /// Optimize a site from its interaction data
    ///
    /// Skips are returned as `Ok(Skipped)`. Generator, timeout and extraction
    /// failures are returned as errors after recording `Failed`.
    ///
    /// The run executes on its own task: dropping the returned future does
    /// not abandon it, so the site always reaches a terminal state.
    pub async fn optimize(&self, site_id: &str, force: bool) -> Result<OptimizationOutcome> {
        let optimizer = self.clone();
        let owned_id = site_id.to_string();
        let task = tokio::spawn(async move { optimizer.execute(&owned_id, force).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                let error = format!("Optimization task aborted: {}", e);
                self.transition(
                    site_id,
                    OptimizationState::Failed {
                        error: error.clone(),
                    },
                )
                .await;
                Err(HeatforgeError::Other(error))
            }
        }
    }

    async fn execute(&self, site_id: &str, force: bool) -> Result<OptimizationOutcome> {
        let site = self
            .store
            .get_site(site_id)
            .await?
            .ok_or_else(|| HeatforgeError::SiteNotFound(site_id.to_string()))?;

        let events = self.store.list_interactions(site_id).await?;
        let heatmap = aggregate_heatmap(&events);

        match self.evaluate(&site, heatmap.len(), force, Utc::now()).await {
            OptimizationState::Skipped { reason, message } => {
                self.transition(
                    site_id,
                    OptimizationState::Skipped {
                        reason,
                        message: message.clone(),
                    },
                )
                .await;
                return Ok(OptimizationOutcome::Skipped { reason, message });
            }
            state => self.transition(site_id, state).await,
        }

        self.transition(site_id, OptimizationState::Running).await;
        let click_elements = aggregate_click_elements(&events, self.config.click_element_limit);

        match self.run(&site, &heatmap, &click_elements).await {
            Ok(outcome) => {
                if let OptimizationOutcome::Succeeded {
                    original_site_id,
                    optimized_site_id,
                    ..
                } = &outcome
                {
                    self.transition(
                        site_id,
                        OptimizationState::Succeeded {
                            original_site_id: original_site_id.clone(),
                            optimized_site_id: optimized_site_id.clone(),
                        },
                    )
                    .await;
                }
                Ok(outcome)
            }
            Err(e) => {
                self.transition(
                    site_id,
                    OptimizationState::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        site: &Site,
        heatmap: &[HeatmapPoint],
        click_elements: &[ClickElement],
    ) -> Result<OptimizationOutcome> {
        let root_id = site.root_id().to_string();
        let sections = identify(self.query.as_ref(), &site.markup);

        let prompt = OptimizationRequest {
            site,
            click_elements,
            heatmap,
            sections: &sections,
            heatmap_limit: self.config.heatmap_prompt_limit,
        }
        .render();

        let limit = self.config.generator_timeout;
        let response = timeout(limit, self.generator.generate(&prompt))
            .await
            .map_err(|_| HeatforgeError::GeneratorTimeout(limit.as_secs()))??;

        let artifacts = extract_code_blocks(&response)?;

        let (markup, style, script, restored, fell_back) =
            match reconcile(self.query.as_ref(), &artifacts.markup, &sections) {
                Reconciliation::Intact(markup) => {
                    (markup, artifacts.style, artifacts.script, Vec::new(), false)
                }
                Reconciliation::Repaired { markup, restored } => {
                    (markup, artifacts.style, artifacts.script, restored, false)
                }
                Reconciliation::FellBack { reason } => {
                    warn!(
                        "Keeping original markup for {} after failed repair: {}",
                        site.site_id, reason
                    );
                    (
                        site.markup.clone(),
                        site.style.clone(),
                        site.script.clone(),
                        Vec::new(),
                        true,
                    )
                }
            };

        let now = Utc::now();
        let optimized_id = self.next_derived_id(&root_id, now).await?;
        let preview =
            build_preview_document(&markup, &style, &script, &optimized_id, &self.tracker_url);

        let mut derived = Site::new_root(
            optimized_id.clone(),
            markup,
            style,
            script,
            preview,
            site.image_refs.clone(),
        );
        derived.parent_site_id = Some(root_id.clone());
        derived.is_optimized = true;
        derived.created_at = now;
        derived.last_accessed_at = now;

        self.store.put_site(&derived).await?;
        self.cooldown.record(&root_id, now).await;

        info!(
            "Persisted optimized site {} for {} ({} sections restored)",
            optimized_id,
            root_id,
            restored.len()
        );

        Ok(OptimizationOutcome::Succeeded {
            original_site_id: root_id,
            optimized_site_id: optimized_id,
            restored_sections: restored,
            fell_back_to_original: fell_back,
        })
    }

    /// `{root}-optimized-{millis}`, bumped until unused
    async fn next_derived_id(&self, root_id: &str, now: DateTime<Utc>) -> Result<String> {
        let mut millis = now.timestamp_millis();
        loop {
            let candidate = format!("{}-optimized-{}", root_id, millis);
            if self.store.get_site(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            millis += 1;
        }
    }

    /// Start a background optimization if a click pushed the counter onto
    /// the threshold
    ///
    /// The returned handle can be awaited; ingestion callers drop it.
    pub async fn maybe_trigger_on_click(
        self: &Arc<Self>,
        site_id: &str,
        click_count: u64,
    ) -> Result<Option<JoinHandle<()>>> {
        if self.trigger_state(site_id, click_count).await? != OptimizationState::Eligible {
            return Ok(None);
        }

        info!(
            "Click count {} reached threshold for {}, starting optimization",
            click_count, site_id
        );
        let optimizer = Arc::clone(self);
        let site_id = site_id.to_string();
        Ok(Some(tokio::spawn(async move {
            if let Err(e) = optimizer.execute(&site_id, false).await {
                warn!("Background optimization of {} failed: {}", site_id, e);
            }
        })))
    }
}
