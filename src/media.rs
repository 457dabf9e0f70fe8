use serde::Serialize;

pub const DEFAULT_ASSETS_ROOT: &str = "/Assets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn directory(&self) -> &'static str {
        match self {
            MediaKind::Image => "Images",
            MediaKind::Video => "Videos",
        }
    }

    fn formats(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            MediaKind::Image => IMAGE_FORMATS,
            MediaKind::Video => VIDEO_FORMATS,
        }
    }
}

/// Extensions in preference order, paired with their MIME types.
pub const IMAGE_FORMATS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
];

pub const VIDEO_FORMATS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSource {
    pub url: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    assets_root: String,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS_ROOT)
    }
}

impl Resolver {
    pub fn new(assets_root: impl Into<String>) -> Self {
        let root: String = assets_root.into();
        Self {
            assets_root: root.trim_end_matches('/').to_string(),
        }
    }

    /// One candidate per supported extension, in fallback order.
    pub fn sources(&self, filename: &str, kind: MediaKind) -> Vec<MediaSource> {
        kind.formats()
            .iter()
            .map(|(ext, mime_type)| MediaSource {
                url: format!(
                    "{}/{}/{}.{}",
                    self.assets_root,
                    kind.directory(),
                    filename,
                    ext
                ),
                mime_type: *mime_type,
            })
            .collect()
    }

    pub fn primary_source(&self, filename: &str, kind: MediaKind) -> Option<MediaSource> {
        self.sources(filename, kind).into_iter().next()
    }
}

/// First candidate the probe accepts; `None` means the element is dropped.
pub fn select_source<F>(sources: Vec<MediaSource>, mut probe: F) -> Option<MediaSource>
where
    F: FnMut(&MediaSource) -> bool,
{
    sources.into_iter().find(|source| probe(source))
}

pub fn is_image_format(extension: &str) -> bool {
    IMAGE_FORMATS
        .iter()
        .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
}

pub fn is_video_format(extension: &str) -> bool {
    VIDEO_FORMATS
        .iter()
        .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
}

pub fn is_animated_image(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.contains(".gif") || lower.ends_with("gif")
}
