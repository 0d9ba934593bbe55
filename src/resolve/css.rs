//! Stylesheet reference discovery and rewriting
//!
//! CSS carries its own references through `url(...)` notation, resolved
//! against the stylesheet's own URL rather than the document base. Fonts
//! and images found here are downloaded next to the stylesheet and the
//! occurrences rewritten to paths relative to the stylesheet's location
//! (`../fonts/...`, `../images/...`).

use crate::config::ResourceToggles;
use crate::resolve::{is_local_reference, ResourceKind, ResourceRef};
use regex::Regex;
use std::collections::HashMap;
use url::Url;

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "eot", "otf"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

fn url_pattern() -> Option<Regex> {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).ok()
}

/// Classifies a CSS-internal reference by its URL extension
///
/// Extensionless references default to Font; the downloader corrects the
/// kind from the response content-type before anything is written.
fn classify(resolved: &Url) -> Option<ResourceKind> {
    match super::extension_of(resolved) {
        Some(ext) if FONT_EXTENSIONS.contains(&ext.as_str()) => Some(ResourceKind::Font),
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Some(ResourceKind::Image),
        Some(_) => None,
        None => Some(ResourceKind::Font),
    }
}

/// Enumerates font and image references inside stylesheet text
///
/// # Arguments
///
/// * `css_text` - The stylesheet content
/// * `css_url` - The stylesheet's own URL, the base for its relative refs
/// * `toggles` - Which resource classes to collect
pub fn discover_css(css_text: &str, css_url: &Url, toggles: &ResourceToggles) -> Vec<ResourceRef> {
    let pattern = match url_pattern() {
        Some(p) => p,
        None => return Vec::new(),
    };

    let mut refs = Vec::new();
    let mut seen: HashMap<String, ()> = HashMap::new();

    for caps in pattern.captures_iter(css_text) {
        let raw = match caps.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };

        if raw.starts_with("data:") || is_local_reference(raw) {
            continue;
        }
        if seen.contains_key(raw) {
            continue;
        }

        let resolved = match css_url.join(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
            _ => continue,
        };

        let kind = match classify(&resolved) {
            Some(k) => k,
            None => continue,
        };

        let wanted = match kind {
            ResourceKind::Font => toggles.fonts,
            ResourceKind::Image => toggles.images,
            _ => false,
        };
        if !wanted {
            continue;
        }

        seen.insert(raw.to_string(), ());
        refs.push(ResourceRef {
            kind,
            raw: raw.to_string(),
            resolved,
            local_path: None,
        });
    }

    refs
}

/// Converts a snapshot-root-relative path into one relative to the
/// stylesheet's location under `assets/css/`
pub fn to_css_relative(doc_relative: &str) -> String {
    match doc_relative.strip_prefix("assets/") {
        Some(rest) => format!("../{}", rest),
        None => doc_relative.to_string(),
    }
}

/// Rewrites `url(...)` occurrences whose reference was localized
///
/// `replacements` maps raw reference text to a snapshot-root-relative
/// path; occurrences without an entry are left pointing at their original
/// URL. Replacing by exact matched substring keeps the pass idempotent:
/// already-local references never appear as keys.
pub fn rewrite_css(css_text: &str, replacements: &HashMap<String, String>) -> String {
    let pattern = match url_pattern() {
        Some(p) => p,
        None => return css_text.to_string(),
    };

    pattern
        .replace_all(css_text, |caps: &regex::Captures| {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match replacements.get(raw) {
                Some(local) => format!("url({})", to_css_relative(local)),
                None => caps
                    .get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css_url() -> Url {
        Url::parse("https://example.com/assets/theme.css").unwrap()
    }

    fn all_toggles() -> ResourceToggles {
        ResourceToggles::default()
    }

    #[test]
    fn test_discover_font_reference() {
        let css = "@font-face { src: url('fonts/title.woff2'); }";
        let refs = discover_css(css, &css_url(), &all_toggles());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ResourceKind::Font);
        assert_eq!(
            refs[0].resolved.as_str(),
            "https://example.com/assets/fonts/title.woff2"
        );
    }

    #[test]
    fn test_discover_image_reference() {
        let css = ".hero { background: url(\"/img/bg.png\"); }";
        let refs = discover_css(css, &css_url(), &all_toggles());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ResourceKind::Image);
        assert_eq!(refs[0].resolved.as_str(), "https://example.com/img/bg.png");
    }

    #[test]
    fn test_discover_extensionless_defaults_to_font() {
        let css = "@font-face { src: url(//fonts.example.com/a?v=2); }";
        let refs = discover_css(css, &css_url(), &all_toggles());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ResourceKind::Font);
        assert_eq!(refs[0].resolved.as_str(), "https://fonts.example.com/a?v=2");
    }

    #[test]
    fn test_discover_skips_data_uri() {
        let css = ".x { background: url(data:image/png;base64,AAAA); }";
        assert!(discover_css(css, &css_url(), &all_toggles()).is_empty());
    }

    #[test]
    fn test_discover_skips_unknown_extension() {
        let css = ".x { behavior: url(something.htc); }";
        assert!(discover_css(css, &css_url(), &all_toggles()).is_empty());
    }

    #[test]
    fn test_discover_dedupes_repeated_references() {
        let css = ".a { background: url(/bg.png); } .b { background: url(/bg.png); }";
        let refs = discover_css(css, &css_url(), &all_toggles());
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_discover_respects_font_toggle() {
        let css = "@font-face { src: url(fonts/a.woff); }";
        let toggles = ResourceToggles {
            fonts: false,
            ..ResourceToggles::default()
        };
        assert!(discover_css(css, &css_url(), &toggles).is_empty());
    }

    #[test]
    fn test_to_css_relative() {
        assert_eq!(to_css_relative("assets/fonts/a.woff2"), "../fonts/a.woff2");
        assert_eq!(to_css_relative("assets/images/bg.png"), "../images/bg.png");
    }

    #[test]
    fn test_rewrite_replaces_matched_occurrence() {
        let css = ".x { background: url('/bg.png'); } .y { background: url(/other.png); }";
        let mut replacements = HashMap::new();
        replacements.insert("/bg.png".to_string(), "assets/images/bg.png".to_string());
        let out = rewrite_css(css, &replacements);
        assert!(out.contains("url(../images/bg.png)"));
        assert!(out.contains("url(/other.png)"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let css = "@font-face { src: url(https://cdn.example.com/a.woff2); }";
        let mut replacements = HashMap::new();
        replacements.insert(
            "https://cdn.example.com/a.woff2".to_string(),
            "assets/fonts/a.woff2".to_string(),
        );
        let once = rewrite_css(css, &replacements);
        let twice = rewrite_css(&once, &replacements);
        assert_eq!(once, twice);
        assert!(once.contains("url(../fonts/a.woff2)"));
    }
}
