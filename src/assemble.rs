use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::avatar;
use crate::loader::Loader;
use crate::manifest::Manifest;
use crate::model::{Comment, FeedItem, GenericReplyGroup, Post, Profile, UniqueReply};

const UNIQUE_REPLY_SPREAD_MS: i64 = 60 * 60 * 1000;
const GENERIC_REPLY_SPREAD_MS: i64 = 2 * 60 * 60 * 1000;

/// How authored replies and tag-matched reply groups combine on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    /// Generic lines only fill in for posts with no authored replies.
    #[default]
    GenericWhenNoUnique,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    pub policy: ReplyPolicy,
    pub max_generic_groups: usize,
    pub max_generic_lines: usize,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            policy: ReplyPolicy::default(),
            max_generic_groups: 1,
            max_generic_lines: 2,
        }
    }
}

/// Joins posts, profiles and replies named by a manifest into feed items.
pub struct Assembler<R: Rng> {
    loader: Loader,
    rng: R,
    now: Option<DateTime<Utc>>,
    options: AssembleOptions,
}

impl Assembler<StdRng> {
    pub fn from_entropy(loader: Loader, options: AssembleOptions) -> Self {
        Self::new(loader, StdRng::from_entropy(), options)
    }

    pub fn seeded(loader: Loader, seed: u64, options: AssembleOptions) -> Self {
        Self::new(loader, StdRng::seed_from_u64(seed), options)
    }
}

impl<R: Rng> Assembler<R> {
    pub fn new(loader: Loader, rng: R, options: AssembleOptions) -> Self {
        Self {
            loader,
            rng,
            now: None,
            options,
        }
    }

    /// Pins the clock used for synthetic timestamps.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn assemble(&mut self, manifest: &Manifest) -> Vec<FeedItem> {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut run = Run {
            loader: self.loader.clone(),
            manifest,
            profiles: HashMap::new(),
        };

        let unique = run.load_unique_replies();
        let groups = run.load_generic_groups();

        let mut items = Vec::with_capacity(manifest.posts.len());
        let mut skipped = 0usize;

        for entry in &manifest.posts {
            run.loader.pause();
            let Some(post) = run.loader.load_json::<Post>(&entry.path) else {
                skipped += 1;
                continue;
            };
            if post.name.trim().is_empty() {
                warn!(path = %entry.path, "assemble: post without Name skipped");
                skipped += 1;
                continue;
            }

            let profile = run.profile(&post.poster);
            let comments = self.comments_for(&mut run, &post, &unique, &groups, now);

            let id = items.len() + 1;
            items.push(FeedItem {
                id,
                username: display_name(profile.as_ref(), &post.poster),
                handle: handle(profile.as_ref(), &post.poster),
                avatar: avatar::resolve(&post.poster, profile.as_ref()),
                timestamp: now - Duration::hours(id as i64),
                priority: post.priority.unwrap_or(1),
                name: post.name,
                poster: post.poster,
                content: post.body,
                comments,
                tags: post.tags,
                image: post.image.filter(|image| !image.trim().is_empty()),
                profile,
            });
        }

        items.shuffle(&mut self.rng);
        items.sort_by(|a, b| b.priority.cmp(&a.priority));

        info!(
            posts = items.len(),
            skipped,
            comments = items.iter().map(|item| item.comments.len()).sum::<usize>(),
            "assemble: feed ready"
        );
        items
    }

    fn comments_for(
        &mut self,
        run: &mut Run<'_>,
        post: &Post,
        unique: &[UniqueReply],
        groups: &[GenericReplyGroup],
        now: DateTime<Utc>,
    ) -> Vec<Comment> {
        let mut comments = Vec::new();

        for reply in unique.iter().filter(|reply| reply.post_name == post.name) {
            let profile = run.profile(&reply.poster);
            let offset = self.rng.gen_range(0..UNIQUE_REPLY_SPREAD_MS);
            comments.push(Comment {
                id: format!("{}-{}-{}", post.name, reply.poster, comments.len()),
                poster: reply.poster.clone(),
                username: display_name(profile.as_ref(), &reply.poster),
                handle: handle(profile.as_ref(), &reply.poster),
                content: reply.body.clone(),
                timestamp: now - Duration::milliseconds(offset),
                avatar: avatar::resolve(&reply.poster, profile.as_ref()),
                priority: reply.priority.unwrap_or(0),
            });
        }

        let wants_generic = match self.options.policy {
            ReplyPolicy::Both => true,
            ReplyPolicy::GenericWhenNoUnique => comments.is_empty(),
        };
        if wants_generic {
            self.generic_comments(run, post, groups, now, &mut comments);
        }

        comments.sort_by_key(|comment| comment.priority);
        comments
    }

    fn generic_comments(
        &mut self,
        run: &mut Run<'_>,
        post: &Post,
        groups: &[GenericReplyGroup],
        now: DateTime<Utc>,
        comments: &mut Vec<Comment>,
    ) {
        let eligible: Vec<&GenericReplyGroup> =
            groups.iter().filter(|group| group.matches(&post.tags)).collect();
        let picked: Vec<&GenericReplyGroup> = eligible
            .choose_multiple(&mut self.rng, self.options.max_generic_groups)
            .copied()
            .collect();

        for group in picked {
            let speakers: Vec<(&str, Profile)> = group
                .posters
                .iter()
                .filter_map(|poster| run.profile(poster).map(|profile| (poster.as_str(), profile)))
                .collect();
            if speakers.is_empty() {
                debug!(post = %post.name, "assemble: no resolvable posters for reply group");
                continue;
            }

            let lines: Vec<&String> = group
                .comments
                .choose_multiple(&mut self.rng, self.options.max_generic_lines)
                .collect();
            for line in lines {
                let Some((poster, profile)) = speakers.choose(&mut self.rng) else {
                    continue;
                };
                let offset = self.rng.gen_range(0..GENERIC_REPLY_SPREAD_MS);
                comments.push(Comment {
                    id: format!("{}-{}-{}", post.name, poster, comments.len()),
                    poster: poster.to_string(),
                    username: display_name(Some(profile), poster),
                    handle: handle(Some(profile), poster),
                    content: line.clone(),
                    timestamp: now - Duration::milliseconds(offset),
                    avatar: avatar::resolve(poster, Some(profile)),
                    priority: 1,
                });
            }
        }
    }
}

/// Per-run caches so each profile and reply file is fetched once.
struct Run<'a> {
    loader: Loader,
    manifest: &'a Manifest,
    profiles: HashMap<String, Option<Profile>>,
}

impl Run<'_> {
    fn profile(&mut self, poster: &str) -> Option<Profile> {
        if let Some(cached) = self.profiles.get(poster) {
            return cached.clone();
        }

        let profile = match self.manifest.profile_path(poster) {
            Some(path) => {
                self.loader.pause();
                self.loader.load_json::<Profile>(path)
            }
            None => {
                debug!(poster, "assemble: no profile entry");
                None
            }
        };
        self.profiles.insert(poster.to_string(), profile.clone());
        profile
    }

    fn load_unique_replies(&self) -> Vec<UniqueReply> {
        let mut replies = Vec::new();
        for entry in &self.manifest.replies.unique {
            self.loader.pause();
            if let Some(reply) = self.loader.load_json::<UniqueReply>(&entry.path) {
                replies.push(reply);
            }
        }
        replies
    }

    fn load_generic_groups(&self) -> Vec<GenericReplyGroup> {
        let mut groups = Vec::new();
        for entry in &self.manifest.replies.generic {
            self.loader.pause();
            let Some(group) = self.loader.load_json::<GenericReplyGroup>(&entry.path) else {
                continue;
            };
            if group.tags.iter().all(|tag| tag.trim().is_empty()) {
                warn!(path = %entry.path, "assemble: reply group without Tags rejected");
                continue;
            }
            groups.push(group);
        }
        groups
    }
}

fn display_name(profile: Option<&Profile>, poster: &str) -> String {
    profile
        .map(|profile| profile.display_name_or(poster))
        .unwrap_or(poster)
        .to_string()
}

fn handle(profile: Option<&Profile>, poster: &str) -> String {
    let account = profile
        .map(|profile| profile.account_name_or(poster))
        .unwrap_or(poster);
    format!("@{account}")
}
