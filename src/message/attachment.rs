use std::fs;
use std::path::Path;

use super::error::BuildError;

/// A binary attachment: the display filename plus the byte content.
///
/// Content is read exactly once, at message-build time; the source file may
/// change or disappear afterwards without affecting the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Attachment {
    /// Reads `path` fully into memory. A failed read aborts the message build
    /// with [`BuildError::Attachment`] naming the path.
    pub(crate) fn from_path(path: &Path) -> Result<Self, BuildError> {
        let content = fs::read(path).map_err(|source| BuildError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self { filename, content })
    }
}
