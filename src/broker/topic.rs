//! Topic matching
//!
//! A subscription pattern is parsed once, at subscribe time, into an immutable
//! `TopicPattern`. Matching a published topic against it is pure and never
//! touches the caller's buffers, so it needs no synchronization.
//!
//! Grammar, levels separated by `/`:
//! - `+` as a whole level matches exactly one level
//! - `#` (or `*`) as the whole last level matches the rest of the topic,
//!   zero or more levels
//!
//! A pattern that uses a wildcard character anywhere else (`a/b+`, `a/#/c`)
//! is not rejected: it is kept as a literal and only matches a topic that is
//! byte-for-byte identical.

pub const TOPIC_SEPARATOR: char = '/';
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
pub const MULTI_LEVEL_WILDCARD: &str = "#";
pub const ANY_SUFFIX_WILDCARD: &str = "*";

/// Returns true if `topic` matches the subscription `pattern`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    TopicPattern::parse(pattern).matches(topic)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Exact(String),
    Single,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    Literal,
    Wildcard(Vec<Level>),
}

/// A normalized subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    kind: PatternKind,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Self {
        let kind = match Self::parse_levels(pattern) {
            Some(levels) => PatternKind::Wildcard(levels),
            None => PatternKind::Literal,
        };
        Self {
            raw: pattern.to_string(),
            kind,
        }
    }

    /// `None` when the pattern has no well-formed wildcard and must be
    /// compared literally.
    fn parse_levels(pattern: &str) -> Option<Vec<Level>> {
        let parts: Vec<&str> = pattern.split(TOPIC_SEPARATOR).collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());
        let mut has_wildcard = false;

        for (i, part) in parts.iter().enumerate() {
            let level = match *part {
                SINGLE_LEVEL_WILDCARD => Level::Single,
                MULTI_LEVEL_WILDCARD | ANY_SUFFIX_WILDCARD if i == last => Level::Rest,
                MULTI_LEVEL_WILDCARD | ANY_SUFFIX_WILDCARD => return None,
                exact if exact.contains(['+', '#', '*']) => return None,
                exact => Level::Exact(exact.to_string()),
            };
            has_wildcard |= !matches!(level, Level::Exact(_));
            levels.push(level);
        }

        has_wildcard.then_some(levels)
    }

    /// The pattern as the client sent it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard(_))
    }

    pub fn matches(&self, topic: &str) -> bool {
        let levels = match &self.kind {
            PatternKind::Literal => return self.raw == topic,
            PatternKind::Wildcard(levels) => levels,
        };
        if topic.is_empty() {
            return false;
        }

        let mut parts = topic.split(TOPIC_SEPARATOR);
        for level in levels {
            match level {
                Level::Rest => return true,
                Level::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Level::Exact(expected) => match parts.next() {
                    Some(part) if part == expected => {}
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}
