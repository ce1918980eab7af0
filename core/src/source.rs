//! Reading selected files into text with sentinel fallbacks.

use crate::types::FileRecord;

/// Files larger than this are never read or sent for inference.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Outcome of reading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceText {
    Text(String),
    /// Over the byte limit; carries `[File too large: {rel}]`.
    Oversized(String),
    /// Could not be read; carries `[Error reading file: {rel}]`.
    Unreadable(String),
}

impl SourceText {
    pub fn oversized(rel_path: &str) -> Self {
        Self::Oversized(format!("[File too large: {rel_path}]"))
    }

    pub fn unreadable(rel_path: &str) -> Self {
        Self::Unreadable(format!("[Error reading file: {rel_path}]"))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::Oversized(text) | Self::Unreadable(text) => text,
        }
    }
}

/// Read a file, falling back to Latin-1 when it is not valid UTF-8.
///
/// The size check uses the metadata captured at selection time plus a
/// post-read length check, so a file that grew after the walk is still
/// rejected.
pub async fn read_source(record: &FileRecord, max_bytes: u64) -> SourceText {
    if record.size > max_bytes {
        return SourceText::oversized(&record.rel_path);
    }

    match tokio::fs::read(&record.path).await {
        Ok(bytes) if bytes.len() as u64 > max_bytes => SourceText::oversized(&record.rel_path),
        Ok(bytes) => SourceText::Text(decode(bytes)),
        Err(err) => {
            tracing::warn!(file = %record.rel_path, error = %err, "Failed to read file");
            SourceText::unreadable(&record.rel_path)
        }
    }
}

/// Strict UTF-8, else Latin-1 where every byte maps to the code point of
/// equal value. `\r\n` and lone `\r` line endings become `\n`.
pub fn decode(bytes: Vec<u8>) -> String {
    let text: String = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    };
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}
