//! Patch staging
//!
//! Turns a catalog [`PatchDescriptor`](crate::catalog::PatchDescriptor) into
//! an installable folder on disk:
//!
//! ```text
//! {download_base}/{agentId}/{target}/
//! ├── 1.2.0/
//! └── 1.3.0/
//!     ├── patch.zip
//!     ├── extracted/
//!     └── INSTALL_INSTRUCTIONS.txt
//! ```
//!
//! Old version folders are trimmed by a [`RetentionManager`] before a new
//! one is added.

pub mod archive;
pub mod error;
pub mod notice;
pub mod pipeline;
pub mod retention;

pub use error::PipelineError;
pub use pipeline::{PatchPipeline, PipelineSettings, StagedPatch, StagingPipeline};
pub use retention::{DirectoryRetention, RetentionManager, RetentionReport};
