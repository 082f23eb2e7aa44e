use serde::{Deserialize, Serialize};
use std::fmt;

/// Content kind of a hosted asset, derived from its MIME type or filename.
///
/// The kind fully determines which storage backend serves the asset, and the
/// pairing never changes across versions of the same asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
    Image,
    Video,
}

/// Which of the two storage backends an asset routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Flat versioned object storage for text assets.
    FlatStore,
    /// Transformation-capable media storage for images and video.
    MediaStore,
}

impl AssetKind {
    /// Classify from a MIME type. Parameters (e.g. `; charset=utf-8`) are
    /// ignored. Returns `None` for anything outside the four hosted kinds.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/javascript" | "text/javascript" | "application/x-javascript" => {
                Some(Self::Script)
            }
            "text/css" => Some(Self::Style),
            other if other.starts_with("image/") => Some(Self::Image),
            other if other.starts_with("video/") => Some(Self::Video),
            _ => None,
        }
    }

    /// Extension fallback for payloads that arrive without a usable MIME type.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "mjs" | "cjs" => Some(Self::Script),
            "css" => Some(Self::Style),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" => Some(Self::Image),
            "mp4" | "webm" | "mov" | "m4v" | "mkv" => Some(Self::Video),
            _ => None,
        }
    }

    /// The backend this kind routes to. Total and fixed.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Script | Self::Style => BackendKind::FlatStore,
            Self::Image | Self::Video => BackendKind::MediaStore,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlatStore => "flat-store",
            Self::MediaStore => "media-store",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
