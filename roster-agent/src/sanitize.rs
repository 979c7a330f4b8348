//! Inbound content sanitization — secret-masking before anything reaches the
//! model (§4.9 step 1).

use regex::Regex;

/// Default patterns masked when a bot's config doesn't override them:
/// common API key / bearer token shapes.
pub fn default_patterns() -> Vec<String> {
    vec![
        r"sk-[A-Za-z0-9]{20,}".to_string(),
        r"(?i)bearer\s+[A-Za-z0-9._-]{10,}".to_string(),
        r"(?i)api[_-]?key\s*[:=]\s*\S+".to_string(),
    ]
}

/// Compiled form of a bot's configured mask patterns. Invalid patterns are
/// logged and skipped rather than failing the whole sanitizer — one bad
/// regex in config must not block every message.
pub struct Sanitizer {
    patterns: Vec<Regex>,
}

impl Sanitizer {
    pub fn new(patterns: &[String]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "invalid secret mask pattern, skipping");
                    None
                }
            })
            .collect();
        Self { patterns: compiled }
    }

    pub fn mask(&self, content: &str) -> String {
        let mut out = content.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "[redacted]").into_owned();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_api_key_looking_tokens() {
        let sanitizer = Sanitizer::new(&default_patterns());
        let masked = sanitizer.mask("here is my key sk-abcdefghijklmnopqrstuvwxyz");
        assert!(!masked.contains("sk-abcdefghijklmnopqrstuvwxyz"));
        assert!(masked.contains("[redacted]"));
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let sanitizer = Sanitizer::new(&default_patterns());
        assert_eq!(sanitizer.mask("just a normal message"), "just a normal message");
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let sanitizer = Sanitizer::new(&["(".to_string()]);
        assert_eq!(sanitizer.mask("hello"), "hello");
    }
}
