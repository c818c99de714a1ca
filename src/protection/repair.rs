//! Verification and repair of protected regions in regenerated markup
//!
//! A section is present in new markup when its recorded selector still
//! matches at least `match_index + 1` elements. Missing sections are restored
//! by splicing their original outer markup back in at a type-specific anchor:
//!
//! - navigation, then hero: first children of `<body>` (or of `<main>` for
//!   sections located positionally inside it)
//! - footer: last child of `<body>`
//! - contact form: right before the recorded footer when the new markup still
//!   has it, else last child of `<body>`
//!
//! A missing section nested inside another missing section comes back with its
//! container and is not inserted on its own. Bare fragments without a `<body>`
//! are treated as the body content.

use crate::error::{HeatforgeError, Result};
use crate::markup::MarkupQuery;
use crate::types::{ProtectedSection, SectionKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

static BODY_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("valid regex"));

static MAIN_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<main\b[^>]*>").expect("valid regex"));

static BODY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</body\s*>").expect("valid regex"));

/// Result of checking new markup against recorded sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub ok: bool,

    /// Name of the first section found missing
    pub failing_section: Option<String>,
}

impl Verification {
    fn passed() -> Self {
        Self {
            ok: true,
            failing_section: None,
        }
    }
}

fn is_present(query: &dyn MarkupQuery, markup: &str, section: &ProtectedSection) -> Result<bool> {
    Ok(query.count(markup, &section.selector_used)? > section.match_index)
}

/// Check that every section is still present, stopping at the first failure
pub fn verify(
    query: &dyn MarkupQuery,
    markup: &str,
    sections: &[ProtectedSection],
) -> Result<Verification> {
    for section in sections {
        if !is_present(query, markup, section)? {
            debug!(
                "Protected section '{}' missing (selector '{}')",
                section.name, section.selector_used
            );
            return Ok(Verification {
                ok: false,
                failing_section: Some(section.name.clone()),
            });
        }
    }
    Ok(Verification::passed())
}

/// Every section missing from `markup`, each checked individually
pub fn missing_sections<'a>(
    query: &dyn MarkupQuery,
    markup: &str,
    sections: &'a [ProtectedSection],
) -> Result<Vec<&'a ProtectedSection>> {
    let mut missing = Vec::new();
    for section in sections {
        if !is_present(query, markup, section)? {
            missing.push(section);
        }
    }
    Ok(missing)
}

fn concat_outer(sections: &[&ProtectedSection], kind: SectionKind, positional: Option<bool>) -> String {
    sections
        .iter()
        .filter(|s| s.kind == kind)
        .filter(|s| positional.map_or(true, |p| is_main_positional(s) == p))
        .map(|s| s.original_outer_markup.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_main_positional(section: &ProtectedSection) -> bool {
    section.selector_used.starts_with("main >")
}

fn insert_after_open(markup: &mut String, open: &Regex, block: &str) -> bool {
    match open.find(markup) {
        Some(m) => {
            let at = m.end();
            markup.insert_str(at, &format!("\n{}", block));
            true
        }
        None => false,
    }
}

fn insert_at_body_start(markup: &mut String, block: &str) {
    if !insert_after_open(markup, &BODY_OPEN, block) {
        markup.insert_str(0, &format!("{}\n", block));
    }
}

fn insert_at_body_end(markup: &mut String, block: &str) {
    match BODY_CLOSE.find_iter(markup).last() {
        Some(m) => {
            let at = m.start();
            markup.insert_str(at, &format!("{}\n", block));
        }
        None => {
            markup.push('\n');
            markup.push_str(block);
        }
    }
}

/// Drop sections whose markup is carried inside another missing section
fn outermost<'a>(missing: &[&'a ProtectedSection]) -> Vec<&'a ProtectedSection> {
    missing
        .iter()
        .enumerate()
        .filter(|(i, s)| {
            !missing.iter().enumerate().any(|(j, t)| {
                j != *i
                    && t.original_outer_markup.contains(&s.original_outer_markup)
                    && (t.original_outer_markup.len() > s.original_outer_markup.len() || j < *i)
            })
        })
        .map(|(_, s)| *s)
        .collect()
}

/// Byte offset of the recorded footer in `markup`, if it is still there
fn footer_anchor(
    query: &dyn MarkupQuery,
    markup: &str,
    sections: &[ProtectedSection],
) -> Result<Option<usize>> {
    let Some(footer) = sections.iter().find(|s| s.kind == SectionKind::Footer) else {
        return Ok(None);
    };
    let matches = query.select_outer(markup, &footer.selector_used)?;
    Ok(matches
        .get(footer.match_index)
        .and_then(|outer| markup.find(outer.as_str())))
}

fn try_repair(
    query: &dyn MarkupQuery,
    new_markup: &str,
    sections: &[ProtectedSection],
) -> Result<(String, Vec<String>)> {
    let missing = missing_sections(query, new_markup, sections)?;
    if missing.is_empty() {
        return Ok((new_markup.to_string(), Vec::new()));
    }
    let restored = missing.iter().map(|s| s.name.clone()).collect();
    let inserted = outermost(&missing);

    let mut repaired = new_markup.to_string();

    // Contact forms anchor on the recorded footer when it survived generation
    let contact = concat_outer(&inserted, SectionKind::ContactForm, None);
    let footer = concat_outer(&inserted, SectionKind::Footer, None);
    let mut tail = Vec::new();
    if !contact.is_empty() {
        match footer_anchor(query, &repaired, sections)? {
            Some(at) => repaired.insert_str(at, &format!("{}\n", contact)),
            None => tail.push(contact),
        }
    }
    if !footer.is_empty() {
        tail.push(footer);
    }
    if !tail.is_empty() {
        insert_at_body_end(&mut repaired, &tail.join("\n"));
    }

    let hero_in_main = concat_outer(&inserted, SectionKind::Hero, Some(true));
    if !hero_in_main.is_empty() && !insert_after_open(&mut repaired, &MAIN_OPEN, &hero_in_main) {
        insert_at_body_start(&mut repaired, &format!("<main>\n{}\n</main>", hero_in_main));
    }

    let top: Vec<String> = [
        concat_outer(&inserted, SectionKind::Navigation, None),
        concat_outer(&inserted, SectionKind::Hero, Some(false)),
    ]
    .into_iter()
    .filter(|b| !b.is_empty())
    .collect();
    if !top.is_empty() {
        insert_at_body_start(&mut repaired, &top.join("\n"));
    }

    Ok((repaired, restored))
}

/// Reinsert every section missing from `new_markup`
///
/// Falls back to `original_markup` unchanged if the markup cannot be
/// queried.
pub fn repair(
    query: &dyn MarkupQuery,
    original_markup: &str,
    new_markup: &str,
    sections: &[ProtectedSection],
) -> String {
    match try_repair(query, new_markup, sections) {
        Ok((repaired, _)) => repaired,
        Err(e) => {
            warn!("Structural repair failed, keeping original markup: {}", e);
            original_markup.to_string()
        }
    }
}

/// How regenerated markup was reconciled with the protected sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every section survived generation
    Intact(String),

    /// Missing sections were restored
    Repaired { markup: String, restored: Vec<String> },

    /// Repair could not restore the sections; the original markup must be kept
    FellBack { reason: String },
}

/// Verify, repair if needed, and verify again
pub fn reconcile(
    query: &dyn MarkupQuery,
    new_markup: &str,
    sections: &[ProtectedSection],
) -> Reconciliation {
    let outcome: Result<Reconciliation> = (|| {
        if verify(query, new_markup, sections)?.ok {
            return Ok(Reconciliation::Intact(new_markup.to_string()));
        }

        let (markup, restored) = try_repair(query, new_markup, sections)?;
        let check = verify(query, &markup, sections)?;
        if !check.ok {
            return Err(HeatforgeError::StructuralRepair(format!(
                "section '{}' still missing after repair",
                check.failing_section.unwrap_or_default()
            )));
        }

        info!("Restored protected sections: {:?}", restored);
        Ok(Reconciliation::Repaired { markup, restored })
    })();

    outcome.unwrap_or_else(|e| {
        warn!("Falling back to original markup: {}", e);
        Reconciliation::FellBack {
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{ScraperQuery, ScriptedQuery};
    use crate::protection::identify;

    const ORIGINAL: &str = r#"<!DOCTYPE html><html><head></head><body>
<nav class="top"><a href="/">Home</a></nav>
<section class="hero"><h1>Welcome</h1></section>
<div class="content"><p>Body</p></div>
<form class="contact-form"><input name="email"></form>
<footer><p>Contact us</p></footer>
</body></html>"#;

    #[test]
    fn test_identify_then_verify_same_markup() {
        let query = ScraperQuery::new();
        let sections = identify(&query, ORIGINAL);
        assert_eq!(sections.len(), 4);
        assert!(verify(&query, ORIGINAL, &sections).unwrap().ok);
        assert!(verify(&query, "<p></p>", &[]).unwrap().ok);
    }

    #[test]
    fn test_verify_reports_first_failure() {
        let query = ScraperQuery::new();
        let sections = identify(&query, ORIGINAL);
        let stripped = "<html><body><div>new</div></body></html>";
        let check = verify(&query, stripped, &sections).unwrap();
        assert!(!check.ok);
        assert_eq!(check.failing_section.as_deref(), Some("navigation"));
        assert_eq!(missing_sections(&query, stripped, &sections).unwrap().len(), 4);
    }

    #[test]
    fn test_repair_restores_footer() {
        let query = ScraperQuery::new();
        let sections = identify(&query, ORIGINAL);
        let mutated = ORIGINAL.replace("<footer><p>Contact us</p></footer>", "");
        assert!(!verify(&query, &mutated, &sections).unwrap().ok);

        let repaired = repair(&query, ORIGINAL, &mutated, &sections);
        assert!(verify(&query, &repaired, &sections).unwrap().ok);
        let footer_pos = repaired.find("<footer>").unwrap();
        assert!(footer_pos > repaired.find("contact-form").unwrap());
        assert!(footer_pos < repaired.find("</body>").unwrap());
    }

    #[test]
    fn test_repair_places_regions_at_anchors() {
        let query = ScraperQuery::new();
        let sections = identify(&query, ORIGINAL);
        let generated = "<html><head></head><body class=\"v2\"><div class=\"grid\">new layout</div><footer>new footer</footer></body></html>";

        let repaired = repair(&query, ORIGINAL, generated, &sections);
        assert!(verify(&query, &repaired, &sections).unwrap().ok);

        let body_open = repaired.find("<body class=\"v2\">").unwrap();
        let nav = repaired.find("<nav").unwrap();
        let hero = repaired.find("class=\"hero\"").unwrap();
        let grid = repaired.find("class=\"grid\"").unwrap();
        let form = repaired.find("<form").unwrap();
        let footer = repaired.find("<footer>new footer").unwrap();
        assert!(body_open < nav && nav < hero && hero < grid);
        assert!(form < footer);
    }

    #[test]
    fn test_repair_fragment_without_body() {
        let query = ScraperQuery::new();
        let original = "<nav><a>Home</a></nav><p>old</p><footer>f</footer>";
        let sections = identify(&query, original);
        let repaired = repair(&query, original, "<p>new</p>", &sections);
        assert!(repaired.starts_with("<nav>"));
        assert!(repaired.trim_end().ends_with("</footer>"));
        assert!(verify(&query, &repaired, &sections).unwrap().ok);
    }

    #[test]
    fn test_positional_hero_goes_inside_main() {
        let query = ScraperQuery::new();
        let original = "<main><section><h1>Lead</h1></section><section>b</section></main>";
        let sections = identify(&query, original);
        assert_eq!(sections[0].selector_used, "main > section:first-of-type");

        let generated = "<main><div>new</div></main>";
        match reconcile(&query, generated, &sections) {
            Reconciliation::Repaired { markup, restored } => {
                assert_eq!(restored, vec!["hero".to_string()]);
                assert!(markup.find("<main>").unwrap() < markup.find("Lead").unwrap());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_repair_falls_back_on_query_failure() {
        let sections = identify(&ScraperQuery::new(), ORIGINAL);
        let broken = ScriptedQuery::new().failing();
        let repaired = repair(&broken, ORIGINAL, "<p>new</p>", &sections);
        assert_eq!(repaired, ORIGINAL);

        assert!(matches!(
            reconcile(&broken, "<p>new</p>", &sections),
            Reconciliation::FellBack { .. }
        ));
    }

    #[test]
    fn test_reconcile_intact() {
        let query = ScraperQuery::new();
        let sections = identify(&query, ORIGINAL);
        assert_eq!(
            reconcile(&query, ORIGINAL, &sections),
            Reconciliation::Intact(ORIGINAL.to_string())
        );
    }

    #[test]
    fn test_form_nested_in_footer_is_restored_once() {
        let query = ScraperQuery::new();
        let original = r#"<html><head></head><body>
<nav><a href="/">Home</a></nav>
<footer><form class="contact-form"><input name="email"></form><p>Visit us</p></footer>
</body></html>"#;
        let sections = identify(&query, original);
        assert!(sections.iter().any(|s| s.kind == SectionKind::ContactForm));
        assert!(sections.iter().any(|s| s.kind == SectionKind::Footer));

        let generated = "<html><head></head><body><nav><a>Home</a></nav><p>new</p></body></html>";
        match reconcile(&query, generated, &sections) {
            Reconciliation::Repaired { markup, restored } => {
                assert_eq!(markup.matches("<form").count(), 1);
                assert_eq!(markup.matches("<footer>").count(), 1);
                assert!(restored.contains(&"footer".to_string()));
                assert!(restored.contains(&"contact-form".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_contact_form_anchors_on_recorded_footer() {
        let query = ScraperQuery::new();
        let original = r#"<html><head></head><body>
<form class="contact-form"><input name="email"></form>
<div class="site-footer"><p>Contact us</p></div>
</body></html>"#;
        let sections = identify(&query, original);
        let footer = sections
            .iter()
            .find(|s| s.kind == SectionKind::Footer)
            .unwrap();
        assert_eq!(footer.selector_used, ".site-footer");

        let generated = r#"<html><head></head><body><article class="card"><h2>Cake</h2><footer>card meta</footer></article><div class="site-footer"><p>Contact us</p></div></body></html>"#;
        let repaired = repair(&query, original, generated, &sections);
        assert!(verify(&query, &repaired, &sections).unwrap().ok);

        let card_footer = repaired.find("<footer>card meta").unwrap();
        let form = repaired.find("<form").unwrap();
        let site_footer = repaired.find("class=\"site-footer\"").unwrap();
        assert!(card_footer < form && form < site_footer);
    }
}
