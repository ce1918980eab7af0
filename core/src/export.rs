//! Exporting written reports to other document formats.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pulldown_cmark::{Options, Parser, html};
use pulldown_cmark_escape::escape_html;

/// Converts a Markdown report into another artifact.
///
/// Export is best-effort: failures are logged and reported as `None`.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, markdown_path: &Path) -> Option<PathBuf>;
}

/// Renders Markdown to a standalone HTML page next to the report.
#[derive(Debug, Clone, Default)]
pub struct HtmlExporter;

impl HtmlExporter {
    pub fn render(title: &str, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut body = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut body, Parser::new_ext(markdown, options));

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
            escape_text(title)
        )
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String never fails.
    let _ = escape_html(&mut out, text);
    out
}

#[async_trait]
impl Exporter for HtmlExporter {
    async fn export(&self, markdown_path: &Path) -> Option<PathBuf> {
        let markdown = match tokio::fs::read_to_string(markdown_path).await {
            Ok(markdown) => markdown,
            Err(err) => {
                tracing::error!(path = %markdown_path.display(), error = %err, "Export failed: cannot read report");
                return None;
            }
        };

        let title = markdown_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = markdown_path.with_extension("html");
        match tokio::fs::write(&out, Self::render(&title, &markdown)).await {
            Ok(()) => {
                tracing::info!(path = %out.display(), "Report exported");
                Some(out)
            }
            Err(err) => {
                tracing::error!(path = %out.display(), error = %err, "Export failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn renders_headings_and_tasklists() {
        let html = HtmlExporter::render("tool <x>", "# Title\n\n- [ ] todo\n");
        assert!(html.contains("<title>tool &lt;x&gt;</title>"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn title_escapes_quotes_and_ampersands() {
        let html = HtmlExporter::render("a & \"b\"", "");
        assert!(html.contains("<title>a &amp; &quot;b&quot;</title>"));
    }

    #[tokio::test]
    async fn writes_html_next_to_report() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("tool_analysis.md");
        std::fs::write(&md, "## Features\n").unwrap();

        let out = HtmlExporter.export(&md).await.unwrap();

        assert_eq!(out, dir.path().join("tool_analysis.html"));
        assert!(std::fs::read_to_string(out).unwrap().contains("<h2>Features</h2>"));
    }

    #[tokio::test]
    async fn missing_report_exports_nothing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(HtmlExporter.export(&dir.path().join("absent.md")).await, None);
    }
}
