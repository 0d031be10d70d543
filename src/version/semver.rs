//! Canonical version parsing
//!
//! Catalog and directory labels are free-form ("Patch-v1.2.3", "V2.0",
//! "release 1.4.0.7"). They are reduced to a [`CanonicalVersion`] of two to
//! four numeric components before any comparison. Parsing never fails
//! loudly: an unrecognizable label simply has no version.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

/// Prefix token stripped (case-insensitively) before anything else
const PATCH_PREFIX: &str = "patch-";

/// First run of 2-4 dot separated numbers
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?(?:\.\d+)?)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Latest,
    Outdated,
    Newer,
    Invalid,
}

/// Numeric version with up to four components.
///
/// The first three live in a [`semver::Version`], the fourth (revision)
/// breaks ties. Missing components are zero, so "1.2" == "1.2.0" == "1.2.0.0".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalVersion {
    base: Version,
    revision: u64,
}

impl CanonicalVersion {
    pub fn new(major: u64, minor: u64, patch: u64, revision: u64) -> Self {
        Self {
            base: Version::new(major, minor, patch),
            revision,
        }
    }

    /// Parses an already extracted "N.N[.N[.N]]" string.
    fn from_numeric(text: &str) -> Option<Self> {
        let components = text
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        match components.as_slice() {
            [major, minor] => Some(Self::new(*major, *minor, 0, 0)),
            [major, minor, patch] => Some(Self::new(*major, *minor, *patch, 0)),
            [major, minor, patch, revision] => {
                Some(Self::new(*major, *minor, *patch, *revision))
            }
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision == 0 {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}.{}", self.base, self.revision)
        }
    }
}

/// Parse a free-form version label into its canonical form.
///
/// Steps, in order:
/// - strip one `Patch-` prefix (any case)
/// - strip one leading `v`/`V`
/// - take the first "digits separated by dots" run with 2-4 components
///
/// Examples:
/// - "Patch-v1.2.3" -> 1.2.3
/// - "V2.0" -> 2.0.0
/// - "build 4.1.0.7 final" -> 4.1.0.7
/// - "latest" -> None
pub fn parse_version(label: &str) -> Option<CanonicalVersion> {
    let mut cleaned = label.trim();

    if cleaned.len() >= PATCH_PREFIX.len()
        && cleaned.is_char_boundary(PATCH_PREFIX.len())
        && cleaned[..PATCH_PREFIX.len()].eq_ignore_ascii_case(PATCH_PREFIX)
    {
        cleaned = &cleaned[PATCH_PREFIX.len()..];
    }

    if let Some(rest) = cleaned
        .strip_prefix('v')
        .or_else(|| cleaned.strip_prefix('V'))
    {
        cleaned = rest;
    }

    let matched = VERSION_PATTERN.find(cleaned)?;
    CanonicalVersion::from_numeric(matched.as_str())
}

/// Pick the higher of two already parsed labels, returning the original text.
///
/// - neither parses -> "0.0.0"
/// - one parses -> that one
/// - both parse -> the higher; on a tie, `second`
pub fn higher_of_parsed(
    (first, first_version): (&str, Option<CanonicalVersion>),
    (second, second_version): (&str, Option<CanonicalVersion>),
) -> String {
    match (first_version, second_version) {
        (None, None) => crate::config::UNKNOWN_VERSION.to_string(),
        (Some(_), None) => first.to_string(),
        (None, Some(_)) => second.to_string(),
        (Some(a), Some(b)) => {
            if a > b {
                first.to_string()
            } else {
                second.to_string()
            }
        }
    }
}
