use crate::error::{Error, Result};
use log::debug;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Read-only file handed to an upload session.
///
/// The contents are shared, so cloning is cheap and several sessions can read
/// from the same data at once.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    data: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path has no valid UTF-8 file name
    /// - The file cannot be read
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = file_name(path)?;
        let mime_type = guess_mime_type(path);

        let data = tokio::fs::read(path).await?;
        debug!("Read {name} ({} bytes, {mime_type})", data.len());

        Ok(Self::new(name, mime_type, data))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Bytes in `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside the file, which the chunk planner never
    /// produces.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn slice(&self, start: u64, end: u64) -> &[u8] {
        &self.data[start as usize..end as usize]
    }
}

/// Name, type and size of a file on disk, without its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl FileInfo {
    /// Stats a file so it can be validated before it is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path has no valid UTF-8 file name
    /// - The file metadata cannot be read
    pub async fn inspect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        Ok(Self {
            name: file_name(path)?,
            mime_type: guess_mime_type(path),
            size: metadata.len(),
        })
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| Error::ConfigError(format!("Invalid filename: {}", path.display())))
}

fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_from_path_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manuscript.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"%PDF-1.7 fake").unwrap();

        let source = SourceFile::from_path(&path).await.unwrap();

        assert_eq!(source.name(), "manuscript.pdf");
        assert_eq!(source.mime_type(), "application/pdf");
        assert_eq!(source.size(), 13);
        assert_eq!(source.slice(0, 4), b"%PDF");
    }

    #[tokio::test]
    async fn test_from_path_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zzzunknown");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let source = SourceFile::from_path(&path).await.unwrap();

        assert_eq!(source.mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_inspect_reports_size_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(3 * 1024 * 1024).unwrap();

        let info = FileInfo::inspect(&path).await.unwrap();

        assert_eq!(info.name, "track.mp3");
        assert_eq!(info.mime_type, "audio/mpeg");
        assert_eq!(info.size, 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let result = SourceFile::from_path("/definitely/not/here.pdf").await;
        assert!(matches!(result, Err(Error::FileError(_))));
    }
}
