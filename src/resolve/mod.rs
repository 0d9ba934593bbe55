//! Resource resolution and rewriting
//!
//! Given rendered markup (or stylesheet text) and a base URL, this module
//! enumerates resource references, normalizes each to an absolute URL,
//! decides a local filename, and rewrites the reference in place.
//!
//! Rewriting is string-level substitution against the original markup
//! text, keyed on the exact reference text as it appeared in source. Two
//! references with identical raw text resolve to the same URL and the
//! same local file, so replacing every occurrence of that raw text is the
//! correct substitution for all of them at once. References that already
//! look local (under `assets/`) are skipped at discovery, which makes the
//! whole pass idempotent.

mod css;
mod filename;
mod sanitize;

pub use css::{discover_css, rewrite_css, to_css_relative};
pub use filename::{extension_of, local_filename};
pub use sanitize::sanitize_html;

use crate::config::ResourceToggles;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Resource classes the archiver localizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stylesheet,
    Script,
    Image,
    Font,
}

impl ResourceKind {
    /// Subdirectory under `assets/` that this kind is stored in
    pub fn asset_dir(&self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "css",
            ResourceKind::Script => "js",
            ResourceKind::Image => "images",
            ResourceKind::Font => "fonts",
        }
    }

    /// Attribute carrying the reference in HTML-sourced elements
    pub fn html_attr(&self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "href",
            _ => "src",
        }
    }

    /// Prefix for synthesized filenames
    pub fn synth_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "style",
            ResourceKind::Script => "script",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
        }
    }

    /// Fallback extension when neither the URL nor the response names one
    pub fn default_extension(&self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "css",
            ResourceKind::Script => "js",
            ResourceKind::Image => "jpg",
            ResourceKind::Font => "woff",
        }
    }

    /// Classifies a response content-type into a storable kind
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_ascii_lowercase();
        if ct.starts_with("image/") {
            Some(ResourceKind::Image)
        } else if ct.starts_with("font/") || ct.contains("font") {
            Some(ResourceKind::Font)
        } else if ct.contains("css") {
            Some(ResourceKind::Stylesheet)
        } else if ct.contains("javascript") {
            Some(ResourceKind::Script)
        } else {
            None
        }
    }
}

/// One discovered reference from markup or stylesheet text
///
/// `raw` is the exact reference text as it appeared in source; it is the
/// rewrite key. `local_path` is relative to the snapshot root and is set
/// exactly once, by the downloader, after a successful fetch.
#[derive(Debug, Clone)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub raw: String,
    pub resolved: Url,
    pub local_path: Option<String>,
}

impl ResourceRef {
    fn new(kind: ResourceKind, raw: &str, resolved: Url) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
            resolved,
            local_path: None,
        }
    }
}

/// Recognizes references that already point into the snapshot tree
///
/// Rewriting an already-rewritten document must be a no-op, so anything
/// that looks like one of our own local paths is skipped at discovery.
pub fn is_local_reference(raw: &str) -> bool {
    raw.starts_with("assets/") || raw.starts_with("../")
}

/// Resolves a raw reference to an absolute URL
///
/// Data URIs and already-local references yield `None`. Protocol-relative
/// references (`//host/...`) take the base's scheme; relative references
/// resolve against the base with standard relative-URL rules.
pub fn resolve_reference(raw: &str, base: &Url) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("data:") || is_local_reference(trimmed) {
        return None;
    }

    match base.join(trimmed) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Some(url),
        _ => None,
    }
}

/// Enumerates resource references in rendered markup, in document order
/// within each class
///
/// # Arguments
///
/// * `html` - The rendered markup
/// * `base` - Document base URL for resolving relative references
/// * `toggles` - Which resource classes to collect
pub fn discover(html: &str, base: &Url, toggles: &ResourceToggles) -> Vec<ResourceRef> {
    let document = Html::parse_document(html);
    let mut refs = Vec::new();

    if toggles.css {
        collect(&document, "link[rel='stylesheet'][href]", "href", base, ResourceKind::Stylesheet, &mut refs);
    }
    if toggles.js {
        collect(&document, "script[src]", "src", base, ResourceKind::Script, &mut refs);
    }
    if toggles.images {
        collect(&document, "img[src]", "src", base, ResourceKind::Image, &mut refs);
    }

    refs
}

fn collect(
    document: &Html,
    selector: &str,
    attr: &str,
    base: &Url,
    kind: ResourceKind,
    refs: &mut Vec<ResourceRef>,
) {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return,
    };

    for element in document.select(&selector) {
        if let Some(raw) = element.value().attr(attr) {
            if let Some(resolved) = resolve_reference(raw, base) {
                refs.push(ResourceRef::new(kind, raw, resolved));
            }
        }
    }
}

/// Applies completed download results back into the markup text
///
/// For every reference with a local path, each attribute occurrence of
/// the raw reference (double-quoted, single-quoted, or unquoted, with a
/// case-insensitive attribute name, plus the entity-encoded form the
/// source may carry) is replaced with the local relative path. References
/// without a local path are left untouched, still pointing at their
/// original remote URL.
pub fn rewrite_html(html: &str, refs: &[ResourceRef]) -> String {
    let mut out = html.to_string();

    for r in refs {
        let local = match &r.local_path {
            Some(p) => p,
            None => continue,
        };
        let attr = r.kind.html_attr();

        for raw in [r.raw.clone(), r.raw.replace('&', "&amp;")] {
            let value = regex::escape(&raw);
            // Group 1: whitespace + attribute name + equals; group 3:
            // the delimiter after an unquoted value, re-emitted as-is.
            let pattern = format!(
                r#"(\s(?i:{attr})\s*=\s*)("{value}"|'{value}'|{value}([\s>]|$))"#,
                attr = attr,
                value = value,
            );
            let re = match Regex::new(&pattern) {
                Ok(re) => re,
                Err(_) => continue,
            };
            out = re
                .replace_all(&out, |caps: &regex::Captures| {
                    let trailer = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                    format!(r#"{}"{}"{}"#, &caps[1], local, trailer)
                })
                .into_owned();
        }
    }

    out
}
