//! Core data types for the Heatforge optimization loop
//!
//! This module defines the records that flow through the feedback loop:
//! interaction events captured in the browser, generated sites and their
//! optimized derivatives, and the derived aggregates (heatmap points, click
//! elements, protected sections) computed on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters of element text kept per interaction
pub const MAX_ELEMENT_TEXT_CHARS: usize = 100;

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Kind of observed interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Pointer click
    Click,

    /// Pointer movement
    #[serde(alias = "movement")]
    Move,

    /// Throttled scroll sample
    Scroll,

    /// Page became visible
    #[serde(alias = "pageview")]
    Pageload,

    /// Page is being unloaded
    Pageexit,

    /// Application-defined event
    Custom,
}

impl EventKind {
    /// Stable lowercase name used for persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Move => "move",
            EventKind::Scroll => "scroll",
            EventKind::Pageload => "pageload",
            EventKind::Pageexit => "pageexit",
            EventKind::Custom => "custom",
        }
    }

    /// Parse a persisted kind name, accepting legacy aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "click" => Some(EventKind::Click),
            "move" | "movement" => Some(EventKind::Move),
            "scroll" => Some(EventKind::Scroll),
            "pageload" | "pageview" => Some(EventKind::Pageload),
            "pageexit" => Some(EventKind::Pageexit),
            "custom" => Some(EventKind::Custom),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single interaction captured on a rendered site
///
/// Coordinates are viewport-normalized (`clientX / innerWidth`,
/// `clientY / innerHeight`), so both lie in `0.0..=1.0`. Events are immutable
/// once appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    /// Site the event was observed on
    #[serde(alias = "websiteId")]
    pub site_id: String,

    /// Browser session (random UUID persisted per site in local storage)
    #[serde(default)]
    pub session_id: Option<String>,

    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default)]
    pub x: Option<f64>,

    #[serde(default)]
    pub y: Option<f64>,

    /// Free-form numeric payload for custom events
    #[serde(default)]
    pub value: Option<f64>,

    /// Epoch milliseconds
    #[serde(default = "now_millis")]
    pub timestamp: i64,

    /// Best-effort CSS path of the event target
    #[serde(default, alias = "path")]
    pub dom_path: Option<String>,

    /// Visible text of the event target, at most 100 characters
    #[serde(default)]
    pub element_text: Option<String>,

    #[serde(default)]
    pub scroll_percentage: Option<f64>,

    /// Time between page load and page exit
    #[serde(default, alias = "timeSpent")]
    pub time_spent_ms: Option<i64>,

    #[serde(default)]
    pub viewport_width: Option<u32>,

    #[serde(default)]
    pub viewport_height: Option<u32>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub referrer: Option<String>,
}

impl InteractionEvent {
    /// Create a bare event of the given kind stamped with the current time
    pub fn new(site_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            site_id: site_id.into(),
            session_id: None,
            kind,
            x: None,
            y: None,
            value: None,
            timestamp: now_millis(),
            dom_path: None,
            element_text: None,
            scroll_percentage: None,
            time_spent_ms: None,
            viewport_width: None,
            viewport_height: None,
            user_agent: None,
            referrer: None,
        }
    }

    /// Create a click event at normalized coordinates
    pub fn click(site_id: impl Into<String>, x: f64, y: f64) -> Self {
        let mut event = Self::new(site_id, EventKind::Click);
        event.x = Some(x);
        event.y = Some(y);
        event
    }

    /// Attach the target's DOM path and text
    pub fn with_target(mut self, dom_path: impl Into<String>, text: impl Into<String>) -> Self {
        self.dom_path = Some(dom_path.into());
        let text = text.into();
        self.element_text = if text.is_empty() { None } else { Some(text) };
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn is_click(&self) -> bool {
        self.kind == EventKind::Click
    }
}

/// One generated website artifact
///
/// A root site has `parent_site_id == None`. A derived (optimized) site always
/// points at the original root it was optimized from, never at an
/// intermediate derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub site_id: String,
    pub markup: String,
    pub style: String,
    pub script: String,

    /// Standalone document combining markup, style, script and the capture script
    pub preview_document: String,

    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub view_count: u64,
    pub click_count: u64,

    /// Original site this record was derived from
    #[serde(default)]
    pub parent_site_id: Option<String>,

    #[serde(default)]
    pub is_optimized: bool,

    #[serde(default)]
    pub image_refs: Vec<String>,
}

impl Site {
    /// Create a fresh root site with zeroed counters
    pub fn new_root(
        site_id: impl Into<String>,
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
        preview_document: impl Into<String>,
        image_refs: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            site_id: site_id.into(),
            markup: markup.into(),
            style: style.into(),
            script: script.into(),
            preview_document: preview_document.into(),
            created_at: now,
            last_accessed_at: now,
            view_count: 0,
            click_count: 0,
            parent_site_id: None,
            is_optimized: false,
            image_refs,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_site_id.is_none()
    }

    /// Id of the original site this record belongs to
    pub fn root_id(&self) -> &str {
        self.parent_site_id.as_deref().unwrap_or(&self.site_id)
    }
}

/// Aggregate of click events sharing exact `(x, y)` coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub x: f64,
    pub y: f64,
    pub count: u64,
}

/// Aggregate of click events sharing a DOM path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickElement {
    pub dom_path: String,
    pub count: u64,

    /// Element text of the first event seen for this path
    pub sample_text: Option<String>,
}

/// Structural region types that must survive optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Navigation,
    Hero,
    Footer,
    #[serde(alias = "contact_form")]
    ContactForm,
}

impl SectionKind {
    /// All region types in identification order
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Navigation,
        SectionKind::Hero,
        SectionKind::Footer,
        SectionKind::ContactForm,
    ];

    /// Short name used in section names and prompts
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Navigation => "navigation",
            SectionKind::Hero => "hero",
            SectionKind::Footer => "footer",
            SectionKind::ContactForm => "contact-form",
        }
    }

    /// Human-readable description embedded in generation constraints
    pub fn description(&self) -> &'static str {
        match self {
            SectionKind::Navigation => "Primary site navigation menu",
            SectionKind::Hero => "Hero banner at the top of the page",
            SectionKind::Footer => "Page footer with links and contact details",
            SectionKind::ContactForm => "Contact form that visitors submit",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A structural region found in pre-optimization markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedSection {
    /// Unique name, e.g. `navigation` or `contact-form-2` when a selector
    /// matched several elements
    pub name: String,
    pub kind: SectionKind,

    /// The exact selector that located the region
    pub selector_used: String,

    /// Position of this element among the selector's matches
    pub match_index: usize,

    pub description: String,

    /// Serialized outer markup of the region in the original document
    pub original_outer_markup: String,
}
