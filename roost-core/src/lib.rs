//! Core types shared across the Roost hosting workspace.
//!
//! Roost lets a tenant publish a static site under a generated subdomain and
//! upload versioned assets to a CDN-fronted store, gated by per-tier byte
//! quotas. This crate carries the pieces every other crate needs: tenant
//! identifiers and request context, the content-kind classification that
//! drives backend routing, and the shared error taxonomy with its transport
//! mapping.

pub mod error;
pub mod ids;
pub mod kind;
pub mod tenant;

pub use error::{HostError, HostResult};
pub use ids::{AssetId, NamespaceId, TenantId};
pub use kind::{AssetKind, BackendKind};
pub use tenant::TenantCtx;
