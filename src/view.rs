use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use textwrap::{wrap, Options as WrapOptions};

use crate::mentions::{self, Segment};
use crate::model::{Comment, FeedItem};

pub const NO_COMMENTS: &str = "No comments yet";
pub const NO_RESULTS: &str = "No results";

/// Case-insensitive substring match over content, author and tags.
pub fn search<'a>(items: &'a [FeedItem], query: &str) -> Vec<&'a FeedItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items
        .iter()
        .filter(|item| {
            item.content.to_lowercase().contains(&needle)
                || item.username.to_lowercase().contains(&needle)
                || item.handle.to_lowercase().contains(&needle)
                || item
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: usize,
}

impl Page {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn count(&self, total: usize) -> usize {
        total.div_ceil(self.size).max(1)
    }

    /// Items on the 1-based `number` page; out-of-range numbers clamp to the nearest page.
    pub fn slice<'a, T>(&self, items: &'a [T], number: usize) -> &'a [T] {
        let number = number.clamp(1, self.count(items.len()));
        let start = (number - 1) * self.size;
        let end = (start + self.size).min(items.len());
        &items[start.min(end)..end]
    }
}

#[derive(Debug, Default, Clone)]
pub struct Expanded {
    ids: HashSet<usize>,
}

impl Expanded {
    pub fn toggle(&mut self, id: usize) -> bool {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
            return true;
        }
        false
    }

    pub fn is_expanded(&self, id: usize) -> bool {
        self.ids.contains(&id)
    }

    pub fn expand_all<'a>(&mut self, items: impl IntoIterator<Item = &'a FeedItem>) {
        self.ids.extend(items.into_iter().map(|item| item.id));
    }
}

/// Plain-text rendering of a page of feed items. `images` maps item ids to the
/// media URL that resolved; items with an unresolved image show none.
pub fn render(
    items: &[&FeedItem],
    images: &HashMap<usize, String>,
    expanded: &Expanded,
    width: usize,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    if items.is_empty() {
        out.push_str(NO_RESULTS);
        out.push('\n');
        return out;
    }

    for item in items {
        let _ = writeln!(
            out,
            "{} {} · {}",
            item.username,
            item.handle,
            relative_time(item.timestamp, now)
        );
        let options = WrapOptions::new(width)
            .initial_indent("  ")
            .subsequent_indent("  ");
        for line in wrap(&highlight(&item.content), options) {
            let _ = writeln!(out, "{line}");
        }
        if let Some(url) = images.get(&item.id) {
            let _ = writeln!(out, "  [image: {url}]");
        }
        if !item.tags.is_empty() {
            let _ = writeln!(out, "  #{}", item.tags.join(" #"));
        }

        if item.comments.is_empty() {
            let _ = writeln!(out, "  {NO_COMMENTS}");
        } else if expanded.is_expanded(item.id) {
            for comment in &item.comments {
                render_comment(&mut out, comment, width, now);
            }
        } else {
            let noun = if item.comments.len() == 1 { "comment" } else { "comments" };
            let _ = writeln!(out, "  {} {noun}", item.comments.len());
        }
        out.push('\n');
    }
    out
}

fn render_comment(out: &mut String, comment: &Comment, width: usize, now: DateTime<Utc>) {
    let _ = writeln!(
        out,
        "    ↳ {} {} · {}",
        comment.username,
        comment.handle,
        relative_time(comment.timestamp, now)
    );
    let options = WrapOptions::new(width)
        .initial_indent("      ")
        .subsequent_indent("      ");
    for line in wrap(&highlight(&comment.content), options) {
        let _ = writeln!(out, "{line}");
    }
}

fn highlight(text: &str) -> String {
    mentions::parse(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Mention(user) => format!("[@{user}]"),
        })
        .collect()
}

fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    if elapsed.num_minutes() < 1 {
        "now".into()
    } else if elapsed.num_hours() < 1 {
        format!("{}m", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h", elapsed.num_hours())
    } else {
        format!("{}d", elapsed.num_days())
    }
}
