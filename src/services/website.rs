//! Website generation and serving

use crate::error::{HeatforgeError, Result};
use crate::markup::{build_preview_document, extract_code_blocks};
use crate::services::llm::ContentGenerator;
use crate::storage::SiteStore;
use crate::types::Site;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Image references handed to the generator
///
/// Image generation is not performed; these placeholder paths are embedded
/// in the prompt and recorded on the site.
pub const PLACEHOLDER_IMAGES: [&str; 3] = [
    "/placeholder-images/placeholder1.png",
    "/placeholder-images/placeholder2.png",
    "/placeholder-images/placeholder3.png",
];

const DEMO_STYLE: &str = r#"body { font-family: Arial, sans-serif; padding: 20px; margin: 0; line-height: 1.6; }
h1 { color: #4361ee; margin-bottom: 1rem; }
.container { max-width: 800px; margin: 0 auto; padding: 20px; }
.btn { display: inline-block; padding: 10px 20px; background: #4361ee; color: white; border-radius: 5px; cursor: pointer; margin: 10px 5px; border: none; font-size: 16px; }
.btn:hover { background: #3a56d4; }"#;

/// A site as served to a viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteView {
    pub site: Site,

    /// Requested id when a newer optimized version was served instead
    pub redirected_from: Option<String>,

    /// The requested id was unknown and a placeholder demo site was created
    pub is_demo: bool,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Generation, lookup and view accounting for sites
#[derive(Clone)]
pub struct WebsiteService {
    store: Arc<dyn SiteStore>,
    generator: Arc<dyn ContentGenerator>,
    tracker_url: String,
}

impl WebsiteService {
    pub fn new(
        store: Arc<dyn SiteStore>,
        generator: Arc<dyn ContentGenerator>,
        tracker_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            generator,
            tracker_url: tracker_url.into(),
        }
    }

    pub fn tracker_url(&self) -> &str {
        &self.tracker_url
    }

    /// Restructure a raw description into a well-organized brief
    pub async fn enhance_prompt(&self, raw_prompt: &str) -> Result<String> {
        let raw_prompt = raw_prompt.trim();
        if raw_prompt.is_empty() {
            return Err(HeatforgeError::InvalidInteraction(
                "rawPrompt is required".to_string(),
            ));
        }

        let prompt = format!(
            r#"Transform the following raw text into a well-structured, professionally formatted document with:
1. Clear headings and subheadings (using markdown format with ** for headings)
2. Organized paragraphs
3. Proper bullet points where appropriate
4. All of the original information, with improved presentation

Raw text: {}

Return only the enhanced formatted text, without any explanations or additional notes."#,
            raw_prompt
        );

        let enhanced = self.generator.generate(&prompt).await?;
        Ok(enhanced.trim().to_string())
    }

    /// Generate and persist a new root site
    pub async fn generate_site(&self, enhanced_prompt: &str) -> Result<Site> {
        let enhanced_prompt = enhanced_prompt.trim();
        if enhanced_prompt.is_empty() {
            return Err(HeatforgeError::InvalidInteraction(
                "enhancedPrompt is required".to_string(),
            ));
        }

        let prompt = format!(
            r#"Create a complete and professional website with a beautiful interface using HTML, CSS, and JavaScript based on the following brief:
{brief}

The website should include:
1. A visually appealing layout suited to the kind of site being created
2. Responsive design that works on all screen sizes
3. Modern CSS (flexbox or grid), with deliberate colors and typography
4. Navigation elements for exploring the different sections
5. Interactive features such as forms, buttons or animations

Incorporate the following images:
1. Hero Image: {hero} - use this as the main banner/hero image
2. Section Image 1: {first} - use this in a content section or feature area
3. Section Image 2: {second} - use this in another content section or testimonial area
Use the exact image paths as provided.

Provide the complete code as separate HTML, CSS, and JavaScript code blocks with the appropriate language identifiers."#,
            brief = enhanced_prompt,
            hero = PLACEHOLDER_IMAGES[0],
            first = PLACEHOLDER_IMAGES[1],
            second = PLACEHOLDER_IMAGES[2],
        );

        let response = self.generator.generate(&prompt).await?;
        let artifacts = extract_code_blocks(&response)?;

        let site_id = Uuid::new_v4().to_string();
        let preview = build_preview_document(
            &artifacts.markup,
            &artifacts.style,
            &artifacts.script,
            &site_id,
            &self.tracker_url,
        );
        let site = Site::new_root(
            site_id,
            artifacts.markup,
            artifacts.style,
            artifacts.script,
            preview,
            PLACEHOLDER_IMAGES.iter().map(|s| s.to_string()).collect(),
        );

        self.store.put_site(&site).await?;
        info!("Generated site {}", site.site_id);
        Ok(site)
    }

    /// Placeholder site used when a requested id is unknown
    pub fn demo_site(&self, site_id: &str) -> Site {
        let markup = format!(
            r#"<div class="container">
  <h1>Demo Website</h1>
  <div class="content">
    <p>This is a sample website for ID: {}</p>
    <p>The actual website content is not available, but heatmap tracking works the same way.</p>
    <p>Try clicking on different parts of this page to generate heatmap data.</p>
  </div>
  <div class="buttons">
    <button class="btn">Click Me</button>
    <button class="btn">Another Button</button>
    <button class="btn">Third Button</button>
  </div>
</div>"#,
            escape_html(site_id)
        );
        let preview = build_preview_document(&markup, DEMO_STYLE, "", site_id, &self.tracker_url);
        Site::new_root(site_id, markup, DEMO_STYLE, "", preview, Vec::new())
    }

    /// Id of the newest optimized version to serve instead of `site_id`
    ///
    /// `None` when the site is unknown or already the newest version.
    pub async fn latest_version_id(&self, site_id: &str) -> Result<Option<String>> {
        let Some(site) = self.store.get_site(site_id).await? else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_latest_derived(site.root_id())
            .await?
            .map(|latest| latest.site_id)
            .filter(|id| id != site_id))
    }

    /// Resolve, account and return the site to serve for `site_id`
    ///
    /// Unless `prefer_original` is set, the latest optimized version of the
    /// requested site's original is served in its place.
    pub async fn view_site(&self, site_id: &str, prefer_original: bool) -> Result<SiteView> {
        let (requested, is_demo) = match self.store.get_site(site_id).await? {
            Some(site) => (site, false),
            None => {
                info!("Site {} not found, creating demo site", site_id);
                let demo = self.demo_site(site_id);
                self.store.put_site(&demo).await?;
                (demo, true)
            }
        };

        let mut redirected_from = None;
        let mut served = requested;
        if !prefer_original {
            if let Some(latest) = self.store.find_latest_derived(served.root_id()).await? {
                if latest.site_id != served.site_id {
                    debug!("Serving {} in place of {}", latest.site_id, served.site_id);
                    redirected_from = Some(served.site_id.clone());
                    served = latest;
                }
            }
        }

        let now = Utc::now();
        self.store.record_view(&served.site_id, now).await?;
        served.view_count += 1;
        served.last_accessed_at = now;

        Ok(SiteView {
            site: served,
            redirected_from,
            is_demo,
        })
    }
}
