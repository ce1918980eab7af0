//! File selection: walk a snapshot and group eligible code files by language.

use std::path::Path;

use walkdir::WalkDir;

use crate::types::{FileRecord, language_name};

/// Extensions that are never sent for analysis (binary, media, archives).
pub const IGNORED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".svg", ".ico", ".tif", ".tiff", ".pdf", ".doc",
    ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".zip", ".tar", ".gz", ".rar", ".7z", ".exe",
    ".dll", ".so", ".dylib", ".class", ".pyc", ".mp3", ".mp4", ".avi", ".mov", ".wav", ".flac",
    ".db", ".sqlite", ".sqlite3", ".ttf", ".otf", ".woff", ".woff2", ".bin", ".dat", ".pickle",
    ".pkl",
];

/// Extensions a documentation file may carry.
pub const DOC_EXTENSIONS: &[&str] = &[".md", ".rst", ".txt", ".pdf", ".doc", ".docx", ".html"];

/// Stem keywords that mark a documentation file.
pub const DOC_KEYWORDS: &[&str] = &[
    "readme",
    "license",
    "contributing",
    "changelog",
    "documentation",
    "docs",
    "manual",
    "guide",
    "tutorial",
    "faq",
    "help",
];

/// Lower-cased extension with its leading dot, or `""`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// A documentation extension plus a documentation keyword in the stem.
pub fn is_documentation_file(path: &Path) -> bool {
    if !DOC_EXTENSIONS.contains(&extension_of(path).as_str()) {
        return false;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    DOC_KEYWORDS.iter().any(|kw| stem.contains(kw))
}

/// Files sharing one extension, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageBucket {
    pub extension: String,
    pub files: Vec<FileRecord>,
}

impl LanguageBucket {
    pub fn language(&self) -> &str {
        language_name(&self.extension)
    }
}

/// Buckets in order of first encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub buckets: Vec<LanguageBucket>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.files.is_empty())
    }

    pub fn total_files(&self) -> usize {
        self.buckets.iter().map(|b| b.files.len()).sum()
    }

    fn push(&mut self, record: FileRecord) {
        match self
            .buckets
            .iter_mut()
            .find(|b| b.extension == record.extension)
        {
            Some(bucket) => bucket.files.push(record),
            None => self.buckets.push(LanguageBucket {
                extension: record.extension.clone(),
                files: vec![record],
            }),
        }
    }
}

/// Walk `root` in file-name order and classify every regular file.
///
/// Blocking; callers on the async runtime should wrap this in
/// `spawn_blocking`. Returns an empty selection rather than an error when
/// nothing is eligible.
pub fn select_files(root: &Path) -> Selection {
    let mut selection = Selection::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let extension = extension_of(path);
        if IGNORED_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        let rel_path = match path.strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => continue,
        };

        if is_documentation_file(path) {
            tracing::info!(file = %rel_path, "Skipping documentation file");
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                tracing::warn!(file = %rel_path, error = %err, "Failed to stat file");
                continue;
            }
        };

        selection.push(FileRecord {
            path: path.to_path_buf(),
            rel_path,
            extension,
            size,
        });
    }

    selection
}
