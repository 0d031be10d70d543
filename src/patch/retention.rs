//! Bounded history of downloaded patch folders

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, warn};

use crate::version::comparator::VersionComparator;
use crate::version::semver::CanonicalVersion;

/// What a retention pass did to a product directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub kept: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Trait for trimming old versioned subdirectories
#[cfg_attr(test, automock)]
pub trait RetentionManager: Send + Sync {
    /// Keep at most `keep` version-named subdirectories of `base_dir`
    ///
    /// Never fails: a missing directory is a no-op and deletion errors are
    /// logged and reported in [`RetentionReport::failed`].
    fn enforce(&self, base_dir: &Path, keep: usize) -> RetentionReport;
}

/// Retention over version-named directories, newest version first
pub struct DirectoryRetention {
    comparator: Arc<dyn VersionComparator>,
    remove: fn(&Path) -> std::io::Result<()>,
}

struct Candidate {
    version: CanonicalVersion,
    created: SystemTime,
    path: PathBuf,
}

impl DirectoryRetention {
    pub fn new(comparator: Arc<dyn VersionComparator>) -> Self {
        Self {
            comparator,
            remove: |path: &Path| std::fs::remove_dir_all(path),
        }
    }

    #[cfg(test)]
    fn with_remover(
        comparator: Arc<dyn VersionComparator>,
        remove: fn(&Path) -> std::io::Result<()>,
    ) -> Self {
        Self { comparator, remove }
    }

    fn candidates(&self, base_dir: &Path) -> Vec<Candidate> {
        let entries = match std::fs::read_dir(base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Retention skipped, {:?} does not exist", base_dir);
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to list {:?} for retention: {}", base_dir, e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| warn!("Failed to read entry in {:?}: {}", base_dir, e))
                    .ok()
            })
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let Some(version) = self.comparator.parse(name) else {
                    debug!("Retention ignores {:?}: not a version", name);
                    return None;
                };
                let created = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.created().or_else(|_| m.modified()).ok())
                    .unwrap_or(UNIX_EPOCH);

                Some(Candidate {
                    version,
                    created,
                    path: entry.path(),
                })
            })
            .collect()
    }
}

impl RetentionManager for DirectoryRetention {
    fn enforce(&self, base_dir: &Path, keep: usize) -> RetentionReport {
        let mut candidates = self.candidates(base_dir);
        candidates.sort_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then_with(|| b.created.cmp(&a.created))
        });

        let excess = candidates.split_off(keep.min(candidates.len()));
        let mut report = RetentionReport {
            kept: candidates.into_iter().map(|c| c.path).collect(),
            ..Default::default()
        };

        for candidate in excess {
            match (self.remove)(&candidate.path) {
                Ok(()) => {
                    info!(
                        "Removed old patch folder {:?} ({})",
                        candidate.path, candidate.version
                    );
                    report.removed.push(candidate.path);
                }
                Err(e) => {
                    warn!("Failed to remove old patch folder {:?}: {}", candidate.path, e);
                    report.failed.push(candidate.path);
                }
            }
        }

        report
    }
}
