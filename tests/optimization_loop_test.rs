//! End-to-end tests for the capture → heatmap → optimize loop
//!
//! Drives the services directly over an in-memory store with a scripted
//! content generator, so no network access is needed.

mod common;

use common::*;
use heatforge_core::{
    config::OptimizerConfig,
    error::HeatforgeError,
    optimizer::{OptimizationOutcome, OptimizationState, SkipReason},
    AnalyticsService, InteractionEvent, Optimizer, ScraperQuery, SiteStore, WebsiteService,
};
use std::sync::Arc;

fn optimizer_over(
    store: Arc<dyn SiteStore>,
    generator: Arc<ScriptedGenerator>,
    config: OptimizerConfig,
) -> Arc<Optimizer> {
    Arc::new(Optimizer::new(
        store,
        generator,
        Arc::new(ScraperQuery::new()),
        config,
        "/heatmap-tracker.js",
    ))
}

#[tokio::test]
async fn test_threshold_click_triggers_background_optimization() {
    let store = seeded_memory_store("bakery").await;
    let generator = Arc::new(ScriptedGenerator::fixed(intact_response()));
    let optimizer = optimizer_over(store.clone(), generator.clone(), OptimizerConfig::default());
    let analytics = AnalyticsService::new(store.clone());

    let mut handles = Vec::new();
    for i in 0..50 {
        let event = InteractionEvent::click("bakery", i as f64 / 50.0, 0.3)
            .with_target("section.hero > a.cta", "Order now");
        let outcome = analytics.record_interaction(event).await.unwrap();
        let count = outcome.click_count.unwrap();
        assert_eq!(count, i + 1);

        if let Some(handle) = optimizer.maybe_trigger_on_click("bakery", count).await.unwrap() {
            handles.push((count, handle));
        }
    }

    assert_eq!(handles.len(), 1, "exactly one trigger at the threshold");
    let (count, handle) = handles.pop().unwrap();
    assert_eq!(count, 50);
    handle.await.unwrap();

    assert_eq!(store.count_derived("bakery").await.unwrap(), 1);
    assert_eq!(generator.call_count(), 1);
    assert!(matches!(
        optimizer.status("bakery").await,
        OptimizationState::Succeeded { .. }
    ));

    // The original already has a derivative, so later multiples do not fire
    assert!(optimizer
        .maybe_trigger_on_click("bakery", 100)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_sparse_heatmap_is_skipped_without_generation() {
    let store = seeded_memory_store("bakery").await;
    seed_distinct_clicks(store.as_ref(), "bakery", 9).await;
    let generator = Arc::new(ScriptedGenerator::fixed(intact_response()));
    let optimizer = optimizer_over(store.clone(), generator.clone(), OptimizerConfig::default());

    let outcome = optimizer.optimize("bakery", false).await.unwrap();
    match outcome {
        OptimizationOutcome::Skipped { reason, message } => {
            assert_eq!(reason, SkipReason::InsufficientData);
            assert!(message.contains("10"));
        }
        other => panic!("expected a skip, got {:?}", other),
    }
    assert_eq!(generator.call_count(), 0);
    assert_eq!(store.site_count().await, 1);
}

#[tokio::test]
async fn test_dropped_regions_are_restored_in_derived_site() {
    let store = seeded_memory_store("bakery").await;
    seed_distinct_clicks(store.as_ref(), "bakery", 12).await;
    let generator = Arc::new(ScriptedGenerator::fixed(lossy_response()));
    let optimizer = optimizer_over(store.clone(), generator, OptimizerConfig::default());

    let outcome = optimizer.optimize("bakery", false).await.unwrap();
    let OptimizationOutcome::Succeeded {
        original_site_id,
        optimized_site_id,
        restored_sections,
        fell_back_to_original,
    } = outcome
    else {
        panic!("expected success");
    };

    assert_eq!(original_site_id, "bakery");
    assert_eq!(
        restored_sections,
        vec!["navigation".to_string(), "footer".to_string()]
    );
    assert!(!fell_back_to_original);

    let derived = store.get_site(&optimized_site_id).await.unwrap().unwrap();
    assert!(derived.markup.contains(r#"<nav class="navbar">"#));
    assert!(derived.markup.contains("<footer><p>123 Baker Street</p></footer>"));
    assert!(derived.markup.contains("Now with pastries."));
    assert!(derived.style.contains("orange"));
    assert!(derived.preview_document.contains(&optimized_site_id));

    let nav_at = derived.markup.find("<nav").unwrap();
    let footer_at = derived.markup.find("<footer").unwrap();
    let products_at = derived.markup.find("products").unwrap();
    assert!(nav_at < products_at && products_at < footer_at);

    // The original is untouched
    let original = store.get_site("bakery").await.unwrap().unwrap();
    assert_eq!(original.markup, FIXTURE_MARKUP);
}

#[tokio::test]
async fn test_prompt_carries_heatmap_and_protected_regions() {
    let store = seeded_memory_store("bakery").await;
    seed_distinct_clicks(store.as_ref(), "bakery", 10).await;
    let generator = Arc::new(ScriptedGenerator::fixed(intact_response()));
    let optimizer = optimizer_over(store.clone(), generator.clone(), OptimizerConfig::default());

    optimizer.optimize("bakery", false).await.unwrap();

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("section.hero > a.cta"));
    assert!(prompt.contains("(0.0500, 0.2500)"));
    assert!(prompt.contains("navigation"));
    assert!(prompt.contains("footer"));
    assert!(prompt.contains("contact-form"));
    assert!(prompt.contains(FIXTURE_STYLE));
}

#[tokio::test]
async fn test_generator_failure_leaves_store_unchanged() {
    let store = seeded_memory_store("bakery").await;
    seed_distinct_clicks(store.as_ref(), "bakery", 10).await;
    let generator = Arc::new(ScriptedGenerator::queued(vec![
        Err(HeatforgeError::Generator("overloaded".to_string())),
        Ok(intact_response()),
    ]));
    let optimizer = optimizer_over(store.clone(), generator.clone(), OptimizerConfig::default());

    let err = optimizer.optimize("bakery", false).await.unwrap_err();
    assert!(matches!(err, HeatforgeError::Generator(_)));
    assert_eq!(store.site_count().await, 1);
    assert!(matches!(
        optimizer.status("bakery").await,
        OptimizationState::Failed { .. }
    ));

    // A failed run starts no cooldown, so the retry goes through
    let retry = optimizer.optimize("bakery", false).await.unwrap();
    assert!(retry.optimized_site_id().is_some());
    assert_eq!(store.site_count().await, 2);
}

#[tokio::test]
async fn test_optimized_version_is_served_in_place_of_original() {
    let store = seeded_memory_store("bakery").await;
    seed_distinct_clicks(store.as_ref(), "bakery", 10).await;
    let generator = Arc::new(ScriptedGenerator::fixed(intact_response()));
    let optimizer = optimizer_over(store.clone(), generator.clone(), OptimizerConfig::default());
    let websites = WebsiteService::new(store.clone(), generator, "/heatmap-tracker.js");

    let optimized_id = optimizer
        .optimize("bakery", false)
        .await
        .unwrap()
        .optimized_site_id()
        .unwrap()
        .to_string();

    let view = websites.view_site("bakery", false).await.unwrap();
    assert_eq!(view.site.site_id, optimized_id);
    assert_eq!(view.redirected_from.as_deref(), Some("bakery"));
    assert!(!view.is_demo);

    let original = websites.view_site("bakery", true).await.unwrap();
    assert_eq!(original.site.site_id, "bakery");
    assert!(original.redirected_from.is_none());

    assert_eq!(
        websites.latest_version_id("bakery").await.unwrap(),
        Some(optimized_id.clone())
    );
    assert_eq!(websites.latest_version_id(&optimized_id).await.unwrap(), None);

    let stats = AnalyticsService::new(store.clone())
        .site_stats("bakery", 50, 10)
        .await
        .unwrap();
    assert!(stats.optimization_status.is_optimized);
    assert_eq!(
        stats.optimization_status.latest_optimized_id.as_deref(),
        Some(optimized_id.as_str())
    );
}

#[tokio::test]
async fn test_reset_clears_heatmap_but_keeps_click_counter() {
    let store = seeded_memory_store("bakery").await;
    let analytics = AnalyticsService::new(store.clone());
    for i in 0..4 {
        analytics
            .record_interaction(InteractionEvent::click("bakery", 0.1 * i as f64, 0.1))
            .await
            .unwrap();
    }
    assert_eq!(analytics.heatmap("bakery").await.unwrap().len(), 4);

    assert_eq!(analytics.reset("bakery").await.unwrap(), 4);
    assert!(analytics.heatmap("bakery").await.unwrap().is_empty());

    let site = store.get_site("bakery").await.unwrap().unwrap();
    assert_eq!(site.click_count, 4);
}
