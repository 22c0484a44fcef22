//! HTML cleanup helpers for fetched listing pages.
//!
//! Listing pages carry large script/style payloads that are useless to both
//! extraction strategies; stripping them early keeps pattern scans and
//! completion prompts small.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use scraper::Html;

/// Tags whose text content never describes the listing.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "header", "footer", "nav", "svg", "iframe",
];

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r"<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<noscript\b[^>]*>.*?</noscript>|<svg\b[^>]*>.*?</svg>|<iframe\b[^>]*>.*?</iframe>|<!--.*?-->",
        )
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("valid pattern")
    })
}

/// Remove script/style/noise subtrees from raw HTML.
pub fn strip_noise(html: &str) -> String {
    noise_re().replace_all(html, "").into_owned()
}

/// Extract the meaningful text of a page, skipping chrome (header, footer,
/// nav) along with script/style content. Lines are trimmed and blank lines
/// dropped.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in doc.root_element().descendants() {
        if let scraper::Node::Text(text) = node.value() {
            let skipped = node.ancestors().any(|ancestor| match ancestor.value() {
                scraper::Node::Element(el) => SKIP_TAGS.contains(&el.name()),
                _ => false,
            });
            if skipped {
                continue;
            }
            for line in text.split('\n') {
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_noise_removes_scripts_and_styles() {
        let html = r#"<html><head><style>.a{color:red}</style></head>
            <body><script type="text/javascript">var x = 1;</script>
            <!-- tracking -->
            <p>Casa en venta</p></body></html>"#;
        let stripped = strip_noise(html);
        assert!(!stripped.contains("var x"));
        assert!(!stripped.contains("color:red"));
        assert!(!stripped.contains("tracking"));
        assert!(stripped.contains("Casa en venta"));
    }

    #[test]
    fn test_visible_text_skips_page_chrome() {
        let html = r#"<html><body>
            <header>Mi Inmobiliaria</header>
            <nav><a href="/">Inicio</a></nav>
            <main>
              <h1>Casa en Venta</h1>
              <p>Precio: USD 180.000</p>
            </main>
            <footer>Contacto</footer>
        </body></html>"#;
        let text = visible_text(html);
        assert!(text.contains("Casa en Venta"));
        assert!(text.contains("USD 180.000"));
        assert!(!text.contains("Mi Inmobiliaria"));
        assert!(!text.contains("Inicio"));
        assert!(!text.contains("Contacto"));
    }

    #[test]
    fn test_visible_text_collapses_blank_lines() {
        let html = "<p>uno</p>\n\n\n<p>  dos  </p>";
        assert_eq!(visible_text(html), "uno\ndos");
    }
}
