//! Local filename policy
//!
//! Prefers the last path segment of the resolved URL when it carries an
//! extension; otherwise synthesizes a stable name from a hash of the URL,
//! a kind-specific prefix, and an extension inferred from the response
//! content-type. A filename therefore exists even for extensionless or
//! query-only URLs, and stays stable for a given URL within one run.

use crate::resolve::ResourceKind;
use sha2::{Digest, Sha256};
use url::Url;

/// Content-type fragments mapped to filename extensions
const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("woff2", "woff2"),
    ("woff", "woff"),
    ("ttf", "ttf"),
    ("otf", "otf"),
    ("vnd.ms-fontobject", "eot"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("png", "png"),
    ("gif", "gif"),
    ("svg", "svg"),
    ("webp", "webp"),
    ("css", "css"),
    ("javascript", "js"),
];

/// Extracts the lowercase extension of a URL's last path segment, if any
pub fn extension_of(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Maps a response content-type to a filename extension
fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let ct = content_type.to_ascii_lowercase();
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(fragment, _)| ct.contains(fragment))
        .map(|(_, ext)| *ext)
}

/// First eight hex characters of the URL's SHA-256, the stable name stem
fn url_hash(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

/// Chooses the local filename for a fetched resource
///
/// # Arguments
///
/// * `url` - The resolved absolute URL of the resource
/// * `kind` - The resource class, used for prefix and fallback extension
/// * `content_type` - The response Content-Type header, if present
pub fn local_filename(url: &Url, kind: ResourceKind, content_type: Option<&str>) -> String {
    if let Some(segments) = url.path_segments() {
        if let Some(last) = segments.last() {
            if last.contains('.') && !last.ends_with('.') {
                return last.to_string();
            }
        }
    }

    let ext = content_type
        .and_then(extension_for_content_type)
        .unwrap_or_else(|| kind.default_extension());

    format!("{}_{}.{}", kind.synth_prefix(), url_hash(url), ext)
}
