use crate::error::Error;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Upload destinations exposed by the publishing API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadTarget {
    Generic,
    BookPdf,
    BookAudio,
    MangaChapter,
}

pub const BOOKS_CHUNKED_UPLOAD: &str = "/api/v1/books/chunked-upload/";
pub const MANGAS_CHUNKED_UPLOAD: &str = "/api/v1/mangas/chunked-upload/";

const PDF_TYPES: &[&str] = &["application/pdf"];
const AUDIO_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/ogg",
    "audio/mp4",
    "audio/x-m4a",
    "audio/m4a",
    "audio/aac",
];

impl UploadTarget {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            UploadTarget::Generic => "generic",
            UploadTarget::BookPdf => "book-pdf",
            UploadTarget::BookAudio => "book-audio",
            UploadTarget::MangaChapter => "manga-chapter",
        }
    }

    /// Endpoint path, relative to the API base URL.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            UploadTarget::BookPdf | UploadTarget::BookAudio => BOOKS_CHUNKED_UPLOAD,
            UploadTarget::Generic | UploadTarget::MangaChapter => MANGAS_CHUNKED_UPLOAD,
        }
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        match self {
            UploadTarget::BookPdf | UploadTarget::BookAudio => 200 * MIB,
            UploadTarget::Generic | UploadTarget::MangaChapter => 100 * MIB,
        }
    }

    #[must_use]
    pub fn accepted_types(&self) -> Vec<String> {
        let types = match self {
            UploadTarget::BookAudio => AUDIO_TYPES,
            _ => PDF_TYPES,
        };
        types.iter().map(ToString::to_string).collect()
    }

    /// The `fileType` hint the books endpoint uses to pick a storage folder.
    #[must_use]
    pub fn file_type(&self) -> Option<&'static str> {
        match self {
            UploadTarget::BookPdf => Some("pdf"),
            UploadTarget::BookAudio => Some("audio"),
            UploadTarget::Generic | UploadTarget::MangaChapter => None,
        }
    }
}

impl std::str::FromStr for UploadTarget {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" => Ok(UploadTarget::Generic),
            "book-pdf" | "book_pdf" => Ok(UploadTarget::BookPdf),
            "book-audio" | "book_audio" => Ok(UploadTarget::BookAudio),
            "manga-chapter" | "manga_chapter" => Ok(UploadTarget::MangaChapter),
            _ => Err(Error::ConfigError(format!(
                "Invalid target: '{s}'. Valid targets are: generic, book-pdf, book-audio, manga-chapter"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!("book-pdf".parse::<UploadTarget>().unwrap(), UploadTarget::BookPdf);
        assert_eq!("BOOK_AUDIO".parse::<UploadTarget>().unwrap(), UploadTarget::BookAudio);
        assert!("comic".parse::<UploadTarget>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for target in [
            UploadTarget::Generic,
            UploadTarget::BookPdf,
            UploadTarget::BookAudio,
            UploadTarget::MangaChapter,
        ] {
            assert_eq!(target.as_str().parse::<UploadTarget>().unwrap(), target);
        }
    }

    #[test]
    fn test_book_targets_share_endpoint_and_limit() {
        assert_eq!(UploadTarget::BookPdf.endpoint(), UploadTarget::BookAudio.endpoint());
        assert_eq!(UploadTarget::BookAudio.max_file_size(), 200 * MIB);
        assert_eq!(UploadTarget::Generic.max_file_size(), 100 * MIB);
        assert_eq!(UploadTarget::BookAudio.file_type(), Some("audio"));
        assert!(UploadTarget::BookAudio.accepted_types().contains(&"audio/mpeg".to_string()));
        assert_eq!(UploadTarget::MangaChapter.accepted_types(), vec!["application/pdf".to_string()]);
    }
}
