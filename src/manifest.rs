use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::loader::Loader;

pub const DEFAULT_MANIFEST_PATH: &str = "file-manifest.json";

/// Catalog of every fetchable content file, produced by `scan::generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub posts: Vec<PostEntry>,
    #[serde(default)]
    pub profiles: Vec<NamedEntry>,
    #[serde(default)]
    pub replies: ManifestReplies,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    pub path: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub path: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestReplies {
    #[serde(default)]
    pub unique: Vec<NamedEntry>,
    #[serde(default)]
    pub generic: Vec<NamedEntry>,
}

impl Manifest {
    pub fn profile_path(&self, name: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.path.as_str())
    }

    pub fn file_count(&self) -> usize {
        self.posts.len()
            + self.profiles.len()
            + self.replies.unique.len()
            + self.replies.generic.len()
    }
}

pub struct ManifestProvider {
    loader: Loader,
    path: String,
}

impl ManifestProvider {
    pub fn new(loader: Loader, path: impl Into<String>) -> Self {
        Self {
            loader,
            path: path.into(),
        }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `None` when the manifest is missing or malformed; callers degrade to an empty feed.
    pub fn load(&self, bust_cache: bool) -> Option<Manifest> {
        let path = if bust_cache {
            format!("{}?t={}", self.path, cache_token())
        } else {
            self.path.clone()
        };

        match self.loader.load_raw::<Manifest>(&path) {
            Some(manifest) => {
                debug!(
                    files = manifest.file_count(),
                    last_updated = %manifest.last_updated,
                    "manifest: loaded"
                );
                Some(manifest)
            }
            None => {
                warn!(path = %self.path, "manifest: unavailable, falling back to empty feed");
                None
            }
        }
    }
}

fn cache_token() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
