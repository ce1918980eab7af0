//! Shared value types for one analysis run.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shape of the synthesized report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportVariant {
    #[default]
    Analysis,
    Readme,
    Guidance,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown report variant: {0}")]
pub struct UnknownVariant(pub String);

impl ReportVariant {
    pub const ALL: [ReportVariant; 3] = [Self::Analysis, Self::Readme, Self::Guidance];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Readme => "readme",
            Self::Guidance => "guidance",
        }
    }

    /// Suffix used in the persisted report name, `{repo}_{suffix}.md`.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Readme => "README",
            Self::Guidance => "guidance",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Analysis => "Analysis report",
            Self::Readme => "README file",
            Self::Guidance => "Development guidance",
        }
    }

    /// Parse a caller-supplied variant, falling back to `Analysis` for
    /// anything unrecognized. Never fails.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.parse() {
            Ok(variant) => variant,
            Err(UnknownVariant(value)) => {
                tracing::warn!(
                    variant = %value,
                    "Unknown report variant, defaulting to 'analysis'"
                );
                Self::Analysis
            }
        }
    }
}

impl FromStr for ReportVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(Self::Analysis),
            "readme" => Ok(Self::Readme),
            "guidance" => Ok(Self::Guidance),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for ReportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a repository name from its address: last path segment with any
/// trailing `/` and `.git` removed.
pub fn repo_name_from_address(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}

/// One selected source file inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path inside the snapshot.
    pub path: PathBuf,
    /// Path relative to the snapshot root, `/`-separated.
    pub rel_path: String,
    /// Lower-cased extension including the leading dot; empty when absent.
    pub extension: String,
    pub size: u64,
}

impl FileRecord {
    /// Language name used in logs: extension without the dot, or `unknown`.
    pub fn language(&self) -> &str {
        language_name(&self.extension)
    }
}

pub fn language_name(extension: &str) -> &str {
    let name = extension.trim_start_matches('.');
    if name.is_empty() { "unknown" } else { name }
}

/// One unit of inference work.
#[derive(Debug, Clone, Copy)]
pub struct ChunkContext<'a> {
    pub rel_path: &'a str,
    pub index: usize,
    pub count: usize,
    pub text: &'a str,
}

impl ChunkContext<'_> {
    /// Human-readable position, e.g. `file src/main.rs (part 1/3)`.
    pub fn label(&self) -> String {
        format!(
            "file {} (part {}/{})",
            self.rel_path,
            self.index + 1,
            self.count
        )
    }
}

/// Inference output for one file, chunk results in chunk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFragment {
    pub rel_path: String,
    pub results: Vec<String>,
}

impl AnalysisFragment {
    pub fn render(&self) -> String {
        format!(
            "## Analysis of {}\n\n{}",
            self.rel_path,
            self.results.join("\n\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("README".parse::<ReportVariant>().ok(), Some(ReportVariant::Readme));
        assert_eq!(
            " guidance ".parse::<ReportVariant>().ok(),
            Some(ReportVariant::Guidance)
        );
        assert!("bogus".parse::<ReportVariant>().is_err());
    }

    #[test]
    fn lenient_parse_defaults_to_analysis() {
        assert_eq!(ReportVariant::parse_lenient("bogus"), ReportVariant::Analysis);
        assert_eq!(ReportVariant::parse_lenient(""), ReportVariant::Analysis);
        assert_eq!(ReportVariant::parse_lenient("readme"), ReportVariant::Readme);
    }

    #[test]
    fn file_suffixes() {
        assert_eq!(ReportVariant::Analysis.file_suffix(), "analysis");
        assert_eq!(ReportVariant::Readme.file_suffix(), "README");
        assert_eq!(ReportVariant::Guidance.file_suffix(), "guidance");
    }

    #[test]
    fn every_variant_parses_from_its_name() {
        for variant in ReportVariant::ALL {
            assert_eq!(variant.as_str().parse::<ReportVariant>().ok(), Some(variant));
        }
    }

    #[test]
    fn variant_serializes_lowercase() {
        let json = serde_json::to_string(&ReportVariant::Readme).unwrap();
        assert_eq!(json, "\"readme\"");
    }

    #[test]
    fn repo_name_strips_git_suffix_and_slash() {
        assert_eq!(repo_name_from_address("https://github.com/user/tool.git"), "tool");
        assert_eq!(repo_name_from_address("https://github.com/user/tool/"), "tool");
        assert_eq!(repo_name_from_address("git@github.com:user/tool.git"), "tool");
        assert_eq!(repo_name_from_address("tool"), "tool");
        assert_eq!(repo_name_from_address("https://host/"), "host");
    }

    #[test]
    fn chunk_label_is_one_based() {
        let ctx = ChunkContext {
            rel_path: "src/lib.rs",
            index: 0,
            count: 2,
            text: "",
        };
        assert_eq!(ctx.label(), "file src/lib.rs (part 1/2)");
    }

    #[test]
    fn fragment_render_joins_with_blank_lines() {
        let fragment = AnalysisFragment {
            rel_path: "a.py".to_string(),
            results: vec!["one".to_string(), "two".to_string()],
        };
        assert_eq!(fragment.render(), "## Analysis of a.py\n\none\n\ntwo");
    }

    #[test]
    fn language_name_for_empty_extension() {
        assert_eq!(language_name(""), "unknown");
        assert_eq!(language_name(".rs"), "rs");
    }
}
