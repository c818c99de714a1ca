//! Services layer for Heatforge
//!
//! Provides content-generator integration and website generation/serving.

pub mod llm;
pub mod website;

pub use llm::{ContentGenerator, LlmService, UnavailableGenerator};
pub use website::{SiteView, WebsiteService, PLACEHOLDER_IMAGES};
