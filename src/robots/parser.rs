//! Robots.txt parsing
//!
//! Thin wrapper around the robotstxt crate with an explicit permissive
//! variant used when a policy document cannot be retrieved or parsed.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all regardless of content
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used as the fail-open default when robots.txt cannot be fetched
    /// or parsed: availability is deliberately favored over strictness.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_permits_everything() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("https://example.com/private", "TestBot"));
    }

    #[test]
    fn test_empty_content_permits_everything() {
        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed("https://example.com/anything", "TestBot"));
    }

    #[test]
    fn test_disallow_rule_applies() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private");
        assert!(!robots.is_allowed("https://example.com/private/page", "TestBot"));
        assert!(robots.is_allowed("https://example.com/public", "TestBot"));
    }

    #[test]
    fn test_disallow_everything() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://example.com/", "TestBot"));
    }
}
