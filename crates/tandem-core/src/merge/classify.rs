//! Path classification and per-category resolution strategies.
//!
//! Rules are checked in order and the first match wins:
//!
//! | category | matches                                                    | strategy    |
//! |----------|------------------------------------------------------------|-------------|
//! | docs     | `.md`/`.markdown` extension, or a `README*` file name      | accept-both |
//! | test     | test/spec marker in the file name, or a test directory     | accept-both |
//! | schema   | `.sql` extension, or "schema"/"migration" in the path      | take-theirs |
//! | config   | JSON/YAML/TOML extension, dotfile, or "config" in the name | take-ours   |
//! | source   | everything else                                            | take-theirs |
//!
//! "Ours" is trunk and "theirs" is the session. Accept-both keeps the
//! session's side; a true union of both sides is not attempted.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::vcs::Side;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileCategory {
    Docs,
    Test,
    Schema,
    Config,
    Source,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResolutionStrategy {
    AcceptBoth,
    TakeTheirs,
    TakeOurs,
}

impl FileCategory {
    pub const fn strategy(self) -> ResolutionStrategy {
        match self {
            Self::Docs | Self::Test => ResolutionStrategy::AcceptBoth,
            Self::Schema | Self::Source => ResolutionStrategy::TakeTheirs,
            Self::Config => ResolutionStrategy::TakeOurs,
        }
    }
}

impl ResolutionStrategy {
    /// The conflict side that gets checked out.
    pub const fn side(self) -> Side {
        match self {
            Self::AcceptBoth | Self::TakeTheirs => Side::Theirs,
            Self::TakeOurs => Side::Ours,
        }
    }
}

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];
const TEST_MARKERS: &[&str] = &[".test.", ".spec.", "_test.", "_spec.", "-test.", "-spec."];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

fn extension(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|_| !file_name.starts_with('.') || file_name.matches('.').count() > 1)
}

/// Classify a repository-relative path. Total and deterministic.
pub fn categorize_file(path: &str) -> FileCategory {
    let lower = path.replace('\\', "/").to_lowercase();
    let mut segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
    let file_name = segments.pop().unwrap_or_default();
    let ext = extension(file_name);

    if matches!(ext, Some("md" | "markdown")) || file_name.starts_with("readme") {
        return FileCategory::Docs;
    }

    if file_name.starts_with("test_")
        || TEST_MARKERS.iter().any(|marker| file_name.contains(marker))
        || segments.iter().any(|segment| TEST_DIRS.contains(segment))
    {
        return FileCategory::Test;
    }

    if ext == Some("sql") || lower.contains("schema") || lower.contains("migration") {
        return FileCategory::Schema;
    }

    if ext.is_some_and(|ext| CONFIG_EXTENSIONS.contains(&ext))
        || file_name.starts_with('.')
        || file_name.contains("config")
    {
        return FileCategory::Config;
    }

    FileCategory::Source
}
