use serde::{Deserialize, Serialize};
use std::fmt;

use roost_core::AssetKind;

/// Byte bucket a quota charge lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuotaBucket {
    /// Script and stylesheet bytes.
    CssJs,
    /// Image and video bytes.
    Media,
    /// Whole-site content bytes.
    SiteFiles,
}

impl QuotaBucket {
    /// The bucket an asset kind is metered against.
    pub fn for_kind(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Script | AssetKind::Style => Self::CssJs,
            AssetKind::Image | AssetKind::Video => Self::Media,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CssJs => "css-js",
            Self::Media => "media",
            Self::SiteFiles => "site-files",
        }
    }
}

impl fmt::Display for QuotaBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
