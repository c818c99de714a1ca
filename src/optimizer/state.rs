//! Optimization state machine and per-site bookkeeping
//!
//! Defines:
//! - **OptimizationState**: `Idle → Eligible → Running → Succeeded | Failed | Skipped`
//! - **CooldownTracker**: last successful optimization per original site
//! - **StatusBoard**: last observed state per site id

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Why an optimization request did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Fewer distinct heatmap points than required
    InsufficientData,

    /// The original site was optimized too recently
    Cooldown,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InsufficientData => "insufficientData",
            SkipReason::Cooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one optimization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum OptimizationState {
    /// Nothing requested yet
    Idle,

    /// Trigger conditions hold and guards passed
    Eligible,

    /// Waiting on the content generator
    Running,

    /// A new derived site was persisted
    #[serde(rename_all = "camelCase")]
    Succeeded {
        original_site_id: String,
        optimized_site_id: String,
    },

    /// Generation or extraction failed; nothing was persisted
    Failed { error: String },

    /// A guard declined the request
    Skipped {
        reason: SkipReason,
        message: String,
    },
}

impl OptimizationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OptimizationState::Succeeded { .. }
                | OptimizationState::Failed { .. }
                | OptimizationState::Skipped { .. }
        )
    }

    /// Check if a state transition is valid
    pub fn can_transition_to(&self, next: &OptimizationState) -> bool {
        use OptimizationState::*;
        match (self, next) {
            // A finished run may be followed by a new request
            (s, Idle) => s.is_terminal() || matches!(s, Idle),
            (Idle, Eligible) | (Idle, Skipped { .. }) => true,
            (s, Eligible) | (s, Skipped { .. }) if s.is_terminal() => true,
            (Eligible, Running) => true,
            (Running, Succeeded { .. }) | (Running, Failed { .. }) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizationState::Idle => "idle",
            OptimizationState::Eligible => "eligible",
            OptimizationState::Running => "running",
            OptimizationState::Succeeded { .. } => "succeeded",
            OptimizationState::Failed { .. } => "failed",
            OptimizationState::Skipped { .. } => "skipped",
        }
    }
}

/// Last successful optimization time per original site
///
/// Concurrent updates for the same site are last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    window: Duration,
    last_optimized: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_optimized: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn record(&self, original_id: &str, at: DateTime<Utc>) {
        self.last_optimized
            .write()
            .await
            .insert(original_id.to_string(), at);
    }

    pub async fn last_optimized(&self, original_id: &str) -> Option<DateTime<Utc>> {
        self.last_optimized.read().await.get(original_id).copied()
    }

    /// Time left before `original_id` may be optimized again, if any
    pub async fn remaining(&self, original_id: &str, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_optimized(original_id).await?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub async fn is_cooling_down(&self, original_id: &str, now: DateTime<Utc>) -> bool {
        self.remaining(original_id, now).await.is_some()
    }
}

/// Last observed optimization state per site id
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    states: Arc<RwLock<HashMap<String, OptimizationState>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, site_id: &str) -> OptimizationState {
        self.states
            .read()
            .await
            .get(site_id)
            .cloned()
            .unwrap_or(OptimizationState::Idle)
    }

    pub async fn set(&self, site_id: &str, state: OptimizationState) {
        self.states.write().await.insert(site_id.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn succeeded() -> OptimizationState {
        OptimizationState::Succeeded {
            original_site_id: "a".into(),
            optimized_site_id: "a-optimized-1".into(),
        }
    }

    #[test]
    fn test_transitions() {
        use OptimizationState::*;
        assert!(Idle.can_transition_to(&Eligible));
        assert!(Eligible.can_transition_to(&Running));
        assert!(Running.can_transition_to(&succeeded()));
        assert!(Running.can_transition_to(&Failed { error: "x".into() }));
        assert!(succeeded().can_transition_to(&Eligible));

        assert!(!Idle.can_transition_to(&Running));
        assert!(!Running.can_transition_to(&Eligible));
        assert!(!Eligible.can_transition_to(&succeeded()));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(OptimizationState::Skipped {
            reason: SkipReason::InsufficientData,
            message: "need more".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "skipped");
        assert_eq!(json["reason"], "insufficientData");

        let json = serde_json::to_value(succeeded()).unwrap();
        assert_eq!(json["optimizedSiteId"], "a-optimized-1");
    }

    #[tokio::test]
    async fn test_cooldown_window() {
        let tracker = CooldownTracker::new(Duration::from_secs(3600));
        let t0 = Utc::now();
        assert!(!tracker.is_cooling_down("a", t0).await);

        tracker.record("a", t0).await;
        assert!(tracker.is_cooling_down("a", t0 + ChronoDuration::minutes(59)).await);
        assert!(!tracker.is_cooling_down("a", t0 + ChronoDuration::minutes(60)).await);
        assert!(!tracker.is_cooling_down("b", t0).await);

        let remaining = tracker.remaining("a", t0 + ChronoDuration::minutes(30)).await;
        assert_eq!(remaining, Some(Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn test_status_board_defaults_to_idle() {
        let board = StatusBoard::new();
        assert_eq!(board.get("x").await, OptimizationState::Idle);
        board.set("x", OptimizationState::Running).await;
        assert_eq!(board.get("x").await, OptimizationState::Running);
    }
}
