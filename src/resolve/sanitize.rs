//! Best-effort markup sanitizer
//!
//! Strips script elements, inline event-handler attributes, and embedded
//! frames/objects from captured markup. This is a content-safety pass for
//! offline viewing, not a security boundary; it operates on the markup
//! text directly so the rewrite keys stay byte-exact, and it never fails
//! the capture.

use regex::Regex;

/// Removes active content from markup
pub fn sanitize_html(html: &str) -> String {
    let mut out = html.to_string();

    let passes: &[&str] = &[
        // Script elements with bodies, then any stragglers
        r"(?is)<script\b[^>]*>.*?</script>",
        r"(?i)<script\b[^>]*/?>",
        // Embedded frames and plugin containers
        r"(?is)<iframe\b[^>]*>.*?</iframe>",
        r"(?i)<iframe\b[^>]*/?>",
        r"(?is)<object\b[^>]*>.*?</object>",
        r"(?i)<embed\b[^>]*/?>",
        // Inline event handlers: onclick, onload, onerror, ...
        r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#,
    ];

    for pattern in passes {
        if let Ok(re) = Regex::new(pattern) {
            out = re.replace_all(&out, "").into_owned();
        }
    }

    out
}
