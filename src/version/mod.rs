//! Version labels and locally recorded version state
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐
//! │    semver    │◀────│  Comparator   │◀──── orchestrator, retention
//! │ (canonical)  │     │ (update? max) │
//! └──────────────┘     └───────────────┘
//!
//! ┌──────────────┐
//! │    store     │◀──── orchestrator (reconcile, record applied)
//! │ (localcheck) │
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`semver`]: Canonical parsing of free-form labels
//! - [`comparator`]: `VersionComparator` capability trait
//! - [`store`]: `LocalVersionStore` trait and its file-backed implementation
//! - [`error`]: Error types for the local store

pub mod comparator;
pub mod error;
pub mod semver;
pub mod store;
