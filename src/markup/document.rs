//! Standalone preview documents with the capture script injected

/// URL of the capture script relative to the configured public base
pub fn tracker_script_url(public_base_url: &str) -> String {
    format!("{}/heatmap-tracker.js", public_base_url.trim_end_matches('/'))
}

/// Escape a value for use inside a single-quoted JavaScript string
fn js_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('<', "\\x3C")
}

/// Combine markup, style and script into one document
///
/// The capture script is loaded after the site's own script and initialised
/// with `site_id`. Complete documents (containing `<html`) get the style
/// injected before `</head>` and the scripts before `</body>`; fragments are
/// wrapped in a minimal page.
pub fn build_preview_document(
    markup: &str,
    style: &str,
    script: &str,
    site_id: &str,
    tracker_url: &str,
) -> String {
    let style_tag = format!("<style>\n{}\n</style>", style);
    let scripts = format!(
        "<script>\n{}\n</script>\n<script src=\"{}\"></script>\n<script>initializeHeatmap('{}');</script>",
        script,
        tracker_url,
        js_string(site_id)
    );

    let lower = markup.to_ascii_lowercase();
    if lower.contains("<html") {
        let mut document = markup.to_string();

        // Scripts first so the head offset stays valid
        match lower.rfind("</body>") {
            Some(pos) => document.insert_str(pos, &format!("{}\n", scripts)),
            None => {
                document.push('\n');
                document.push_str(&scripts);
            }
        }
        if let Some(pos) = lower.find("</head>") {
            document.insert_str(pos, &format!("{}\n", style_tag));
        }
        return document;
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Generated Website</title>
{}
</head>
<body>
{}
{}
</body>
</html>
"#,
        style_tag, markup, scripts
    )
}
