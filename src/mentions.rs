use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Segment {
    Text(String),
    Mention(String),
}

/// Splits text into literal runs and `@user` references, left to right.
pub fn parse(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for captures in MENTION.captures_iter(text) {
        let (Some(whole), Some(username)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Mention(username.as_str().to_string()));
        last = whole.end();
    }

    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    if segments.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    segments
}

pub fn extract(text: &str) -> Vec<String> {
    MENTION
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|username| username.as_str().to_string())
        .collect()
}

pub fn has_mentions(text: &str) -> bool {
    MENTION.is_match(text)
}
