//! # roost-store: dual-backend versioned object storage
//!
//! Every hosted asset is classified by content kind and routed to one of two
//! backends behind a uniform contract:
//!
//! ```text
//! ┌──────────────────────┐
//! │   ObjectStoreRouter  │  ← put / delete / list_under / public_url
//! ├──────────┬───────────┤
//! │ FlatStore│ MediaStore│  ← storage primitives
//! └──────────┴───────────┘
//! ```
//!
//! Scripts and stylesheets land in the flat store under explicit versioned
//! paths (`{owner}/{namespace}/v{version}`); images and video go to the
//! media store, which can transform on demand and resolves asynchronously
//! for video. Callers never see backend-specific types, only [`Locator`].

pub mod classify;
pub mod flat;
pub mod keys;
pub mod media;
pub mod router;

pub use classify::classify;
pub use flat::{FlatObject, FlatPutResult, FlatStore, MemoryFlatStore, S3FlatStore};
pub use keys::{DefaultVersionKeys, VersionKeys, FIRST_VERSION};
pub use media::{
    HttpMediaStore, MediaNotification, MediaResourceType, MediaStore, MediaUpload,
    MemoryMediaStore, TransformSpec,
};
pub use router::{Locator, ObjectStoreRouter, PutAsset, StoredObject};
