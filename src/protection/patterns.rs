//! Candidate selectors for each protected region type
//!
//! Selectors are ordered most specific first: explicit tag, then common class
//! names, then ids, then a positional fallback.

use crate::types::SectionKind;

const NAVIGATION: &[&str] = &[
    "nav",
    ".navbar",
    ".navigation",
    ".nav-menu",
    "#navbar",
    "#navigation",
    "header:first-of-type",
];

const HERO: &[&str] = &[
    "section.hero",
    ".hero",
    ".hero-section",
    ".banner",
    ".jumbotron",
    "#hero",
    "main > section:first-of-type",
];

const FOOTER: &[&str] = &["footer", ".footer", ".site-footer", "#footer"];

const CONTACT_FORM: &[&str] = &[
    "form.contact-form",
    ".contact-form",
    "#contact-form",
    "#contact form",
    "form",
];

/// Ordered candidate selectors for a region type
pub fn selectors_for(kind: SectionKind) -> &'static [&'static str] {
    match kind {
        SectionKind::Navigation => NAVIGATION,
        SectionKind::Hero => HERO,
        SectionKind::Footer => FOOTER,
        SectionKind::ContactForm => CONTACT_FORM,
    }
}
