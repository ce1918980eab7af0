//! Persisting synthesized reports.

use std::path::{Path, PathBuf};

use crate::types::ReportVariant;

/// `{repo}_{suffix}.md`
pub fn report_file_name(repo_name: &str, variant: ReportVariant) -> String {
    format!("{repo_name}_{}.md", variant.file_suffix())
}

/// Write the report under `dir`, creating the directory when needed.
///
/// An existing report for the same repository and variant is overwritten.
pub async fn write_report(
    dir: &Path,
    repo_name: &str,
    variant: ReportVariant,
    markdown: &str,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(repo_name, variant));
    tokio::fs::write(&path, markdown).await?;
    tracing::info!(path = %path.display(), "Report written");
    Ok(path)
}
