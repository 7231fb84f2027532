/// URL fragments identifying the internal data response that signals a place
/// page has finished loading its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePatterns {
    patterns: Vec<String>,
}

impl Default for CapturePatterns {
    fn default() -> Self {
        Self::new(["google.com/maps/preview/place", "google.com/maps/place"])
    }
}

impl CapturePatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::CapturePatterns;

    #[test]
    fn recognizes_place_data_requests() {
        let patterns = CapturePatterns::default();
        assert!(patterns.matches(
            "https://www.google.com/maps/preview/place?authuser=0&hl=en&pb=!1m17"
        ));
        assert!(patterns.matches("https://www.google.com/maps/place/Foo/@1,2,3z"));
        assert!(!patterns.matches("https://www.google.com/maps/vt?pb=!1m5"));
    }

    #[test]
    fn empty_patterns_are_dropped() {
        let patterns = CapturePatterns::new(["", "x"]);
        assert_eq!(patterns.patterns(), ["x".to_string()]);
    }
}
