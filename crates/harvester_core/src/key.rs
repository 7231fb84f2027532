use std::fmt;

use regex::Regex;

/// One heuristic for pulling a place identifier out of a URL or payload.
pub trait KeyStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn extract(&self, source: &str) -> Option<String>;
}

/// Regex-backed strategy: returns capture group `group` of the first match.
#[derive(Debug)]
pub struct PatternStrategy {
    name: &'static str,
    regex: Regex,
    group: usize,
}

impl PatternStrategy {
    pub fn new(name: &'static str, pattern: &str, group: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            group,
        })
    }
}

impl KeyStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self, source: &str) -> Option<String> {
        let captures = self.regex.captures(source)?;
        let value = captures
            .get(self.group)
            .or_else(|| captures.get(0))?
            .as_str()
            .trim_end_matches('!');
        (!value.is_empty()).then(|| value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: String,
    pub strategy: &'static str,
}

/// Ordered list of key strategies; the first one that yields wins.
#[derive(Debug)]
pub struct KeyDeriver {
    strategies: Vec<Box<dyn KeyStrategy>>,
}

const STANDARD_PATTERNS: &[(&str, &str, usize)] = &[
    ("data_blob", r"!1s([^!]+)!", 1),
    ("place_path", r"place/[^/]+/([^/@?]+)", 1),
    ("data_param", r"data=.*?!1s([^!]+)!", 1),
    ("preview_param", r"[?&]pb=.*?!1s([^!]+)!", 1),
    ("hex_pair", r"0x[0-9a-fA-F]+:(?:0x)?[0-9a-fA-F]+", 0),
    ("chij", r"ChIJ[a-zA-Z0-9_-]+", 0),
    ("nineteen_s", r"!19s([^?]+)\?", 1),
    ("zero_prefixed", r"0[a-zA-Z0-9]+!", 0),
];

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::standard()
    }
}

impl KeyDeriver {
    pub fn new(strategies: Vec<Box<dyn KeyStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategies for map place URLs, most specific first.
    pub fn standard() -> Self {
        let strategies = STANDARD_PATTERNS
            .iter()
            .map(|(name, pattern, group)| {
                Box::new(
                    PatternStrategy::new(*name, pattern, *group)
                        .expect("built-in key pattern compiles"),
                ) as Box<dyn KeyStrategy>
            })
            .collect();
        Self { strategies }
    }

    pub fn derive(&self, source: &str) -> Option<DerivedKey> {
        self.strategies.iter().find_map(|strategy| {
            strategy.extract(source).map(|key| DerivedKey {
                key,
                strategy: strategy.name(),
            })
        })
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

/// Outcome of correlating a dispatched URL's key with a record's own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Match,
    Mismatch,
    /// One side could not be derived; accepted optimistically.
    Unverifiable,
}

pub fn check_keys(expected: Option<&str>, reported: Option<&str>) -> KeyCheck {
    match (non_empty(expected), non_empty(reported)) {
        (Some(a), Some(b)) => {
            if keys_agree(a, b) {
                KeyCheck::Match
            } else {
                KeyCheck::Mismatch
            }
        }
        _ => KeyCheck::Unverifiable,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Loose equality across the identifier formats seen in the wild (hex pairs,
/// `ChIJ` ids, colon separated forms). Best effort, not authoritative.
pub fn keys_agree(a: &str, b: &str) -> bool {
    let left = normalize_key(a);
    let right = normalize_key(b);
    if left.is_empty() || right.is_empty() {
        return true;
    }
    let left_hex = hex_component(&left);
    let right_hex = hex_component(&right);
    left == right
        || left_hex == right_hex
        || left.contains(right_hex)
        || right_hex.contains(left.as_str())
}

fn normalize_key(id: &str) -> String {
    let id = id.trim();
    let id = id.strip_prefix("0x").unwrap_or(id);
    let id = id.strip_prefix("ChIJ").unwrap_or(id);
    id.chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn hex_component(id: &str) -> &str {
    for (idx, _) in id.match_indices("0x") {
        let rest = &id[idx + 2..];
        let end = rest
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(rest.len());
        if end > 0 {
            return &rest[..end];
        }
    }
    id
}
