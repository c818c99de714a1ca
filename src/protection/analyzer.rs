//! Locating protected regions in pre-optimization markup

use crate::markup::MarkupQuery;
use crate::protection::patterns::selectors_for;
use crate::types::{ProtectedSection, SectionKind};
use tracing::{debug, warn};

/// Find every protected region in `markup`
///
/// For each region type the candidate selectors are tried in order. The first
/// selector matching at least one element wins and yields one section per
/// matched element; later selectors for that type are not tried. A selector
/// the query cannot evaluate counts as matching nothing. Region types that
/// never match contribute no sections.
pub fn identify(query: &dyn MarkupQuery, markup: &str) -> Vec<ProtectedSection> {
    let mut sections = Vec::new();

    for kind in SectionKind::ALL {
        for selector in selectors_for(kind) {
            let matches = match query.select_outer(markup, selector) {
                Ok(matches) => matches,
                Err(e) => {
                    warn!("Skipping selector '{}' for {}: {}", selector, kind, e);
                    continue;
                }
            };

            if matches.is_empty() {
                continue;
            }

            let multiple = matches.len() > 1;
            for (index, outer) in matches.into_iter().enumerate() {
                let name = if multiple {
                    format!("{}-{}", kind.label(), index + 1)
                } else {
                    kind.label().to_string()
                };
                sections.push(ProtectedSection {
                    name,
                    kind,
                    selector_used: selector.to_string(),
                    match_index: index,
                    description: kind.description().to_string(),
                    original_outer_markup: outer,
                });
            }
            break;
        }
    }

    debug!(
        "Identified {} protected sections: {:?}",
        sections.len(),
        sections.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{ScraperQuery, ScriptedQuery};

    #[test]
    fn test_identifies_all_region_types() {
        let markup = r#"<body>
<nav><a href="/">Home</a></nav>
<section class="hero"><h1>Big</h1></section>
<form class="contact-form"><input name="email"></form>
<footer>bye</footer>
</body>"#;
        let sections = identify(&ScraperQuery::new(), markup);
        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["navigation", "hero", "footer", "contact-form"]);
        assert_eq!(sections[0].selector_used, "nav");
        assert_eq!(sections[1].selector_used, "section.hero");
        assert_eq!(sections[3].selector_used, "form.contact-form");
        assert!(sections[2].original_outer_markup.contains("bye"));
    }

    #[test]
    fn test_falls_through_to_later_selectors() {
        let markup = r#"<div class="navbar">menu</div><main><section><h1>First</h1></section><section>Second</section></main>"#;
        let sections = identify(&ScraperQuery::new(), markup);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].selector_used, ".navbar");
        assert_eq!(sections[1].kind, SectionKind::Hero);
        assert_eq!(sections[1].selector_used, "main > section:first-of-type");
        assert!(sections[1].original_outer_markup.contains("First"));
    }

    #[test]
    fn test_multiple_matches_are_indexed() {
        let markup = "<form id=a></form><p></p><form id=b></form>";
        let sections = identify(&ScraperQuery::new(), markup);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "contact-form-1");
        assert_eq!(sections[1].name, "contact-form-2");
        assert_eq!(sections[1].match_index, 1);
    }

    #[test]
    fn test_markup_without_regions() {
        assert!(identify(&ScraperQuery::new(), "<div><p>plain</p></div>").is_empty());
        assert!(identify(&ScraperQuery::new(), "").is_empty());
    }

    #[test]
    fn test_query_errors_count_as_no_match() {
        let query = ScriptedQuery::new()
            .failing_on("nav")
            .with_match(".navbar", "<div class=\"navbar\"></div>");
        let sections = identify(&query, "<div class=\"navbar\"></div>");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].selector_used, ".navbar");
    }
}
