use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::manifest::{Manifest, ManifestReplies, NamedEntry, PostEntry};

const POSTS_DIR: &str = "Posts";
const PROFILES_DIR: &str = "Profiles";
const UNIQUE_REPLIES_DIR: &str = "Replies/UniqueReplies";
const GENERIC_REPLIES_DIR: &str = "Replies/GenericReplies";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("content root {0} not found")]
    MissingRoot(PathBuf),
    #[error("write manifest to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Builds a manifest by walking the fixture tree under `root`.
pub fn generate(root: &Path) -> Result<Manifest, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let posts = json_files(root, POSTS_DIR)
        .into_iter()
        .map(|relative| {
            let segments: Vec<&str> = relative.split('/').collect();
            let profile = segments[1..segments.len() - 1].join("/");
            let filename = strip_json(segments[segments.len() - 1]).to_string();
            PostEntry {
                path: relative.clone(),
                profile,
                filename,
            }
        })
        .collect::<Vec<_>>();

    let profiles = named_entries(root, PROFILES_DIR);
    let unique = named_entries(root, UNIQUE_REPLIES_DIR);
    let generic = named_entries(root, GENERIC_REPLIES_DIR);

    let manifest = Manifest {
        posts,
        profiles,
        replies: ManifestReplies { unique, generic },
        last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    info!(
        posts = manifest.posts.len(),
        profiles = manifest.profiles.len(),
        unique_replies = manifest.replies.unique.len(),
        generic_replies = manifest.replies.generic.len(),
        "scan: manifest generated"
    );
    Ok(manifest)
}

pub fn write(manifest: &Manifest, output: &Path) -> Result<(), ScanError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ScanError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let contents = serde_json::to_string_pretty(manifest)?;
    fs::write(output, contents).map_err(|source| ScanError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    info!(path = %output.display(), "scan: manifest saved");
    Ok(())
}

fn named_entries(root: &Path, subtree: &str) -> Vec<NamedEntry> {
    let prefix = format!("{subtree}/");
    json_files(root, subtree)
        .into_iter()
        .map(|relative| {
            let name = strip_json(relative.strip_prefix(&prefix).unwrap_or(&relative)).to_string();
            NamedEntry {
                path: relative,
                name,
            }
        })
        .collect()
}

/// Root-relative, `/`-separated paths of every `.json` file under `root/subtree`, sorted.
/// Unreadable entries are skipped.
fn json_files(root: &Path, subtree: &str) -> Vec<String> {
    let dir = root.join(subtree);
    if !dir.is_dir() {
        warn!(path = %dir.display(), "scan: directory missing, skipping");
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %dir.display(), "scan: skipping entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let is_json = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "json")
            .unwrap_or(false);
        if !is_json {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let normalized = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(normalized);
        }
    }
    files.sort();
    files
}

fn strip_json(name: &str) -> &str {
    name.strip_suffix(".json").unwrap_or(name)
}
