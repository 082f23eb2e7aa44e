//! # roost-publish: the hosting orchestration layer
//!
//! Coordinates the three independently-failing pieces of state behind every
//! hosting request: the authoritative records (subdomain registry, asset
//! catalog), the remote object bytes, and the TTL-bound resolution cache,
//! under partial failure and without distributed transactions.
//!
//! The central state machine is [`UploadWorkflow`]:
//!
//! ```text
//! Validate → Classify → CheckQuota → Store → PersistMetadata → UpdateLedger → Done
//!     └──────────┴──────────┴──────────┴───────────┴──────────────┴──→ Aborted
//! ```
//!
//! Quota is checked before any remote call; ledger counters move only in
//! lockstep with the store operation they represent, with compensating
//! rollback when a later step fails. Deletions are best-effort sagas that
//! record an outcome per step and reclaim local state regardless of remote
//! outcome.
//!
//! [`HostingService`] bundles the whole subsystem behind injected
//! dependencies so tests substitute in-memory fakes for every backend.

pub mod catalog;
pub mod deletion;
pub mod service;
pub mod sites;
pub mod workflow;

pub use catalog::{AssetCatalog, CdnAsset, MemoryAssetCatalog};
pub use deletion::{AssetReclaimer, DeletionReport, PurgeReport, SagaStep, StepOutcome};
pub use service::{HostingService, ServiceConfig};
pub use sites::{SiteFile, SitePublisher};
pub use workflow::{UploadReport, UploadRequest, UploadState, UploadWorkflow, WorkflowConfig};
