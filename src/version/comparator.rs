//! Version comparison capability used by the orchestrator and retention

use std::cmp::Ordering;

use crate::version::semver::{self, CanonicalVersion, CompareResult};

/// Trait for deciding version order between free-form labels
///
/// The default methods implement the agent's labelling rules; an
/// implementation only needs to override what differs.
pub trait VersionComparator: Send + Sync {
    /// Canonical form of a label, or `None` when it carries no version
    fn parse(&self, label: &str) -> Option<CanonicalVersion> {
        semver::parse_version(label)
    }

    /// Component-wise order; `None` when either side has no version
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(self.parse(a)?.cmp(&self.parse(b)?))
    }

    /// Classify `current` against `latest`
    fn compare_to_latest(&self, current: &str, latest: &str) -> CompareResult {
        match self.compare(current, latest) {
            None => CompareResult::Invalid,
            Some(Ordering::Less) => CompareResult::Outdated,
            Some(Ordering::Equal) => CompareResult::Latest,
            Some(Ordering::Greater) => CompareResult::Newer,
        }
    }

    /// Whether `latest` is strictly newer; false if either label is unparseable
    fn is_update_available(&self, current: &str, latest: &str) -> bool {
        self.compare_to_latest(current, latest) == CompareResult::Outdated
    }

    /// The semantically higher of two labels, as originally written
    fn higher_of(&self, first: &str, second: &str) -> String {
        semver::higher_of_parsed(
            (first, self.parse(first)),
            (second, self.parse(second)),
        )
    }
}

/// Comparator implementing the catalog's labelling rules
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchVersionComparator;

impl VersionComparator for PatchVersionComparator {}
