//! Chunk planning and file validation.
//!
//! Everything here is pure arithmetic: no I/O, no state.

use crate::error::ValidationError;
use crate::upload::source::SourceFile;

/// A `[start, end)` byte range of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Checks a candidate file against the MIME allow-list and size limit.
///
/// An empty `accepted_types` list accepts any type. Zero-byte files are
/// rejected so every upload has at least one chunk to finalize.
///
/// # Errors
///
/// Returns [`ValidationError::WrongType`], [`ValidationError::TooLarge`] or
/// [`ValidationError::Empty`].
pub fn validate_file(
    file: &SourceFile,
    max_size_bytes: u64,
    accepted_types: &[String],
) -> Result<(), ValidationError> {
    validate_attributes(file.mime_type(), file.size(), max_size_bytes, accepted_types)
}

/// Same checks as [`validate_file`], on a type and size known before the
/// contents are read.
///
/// # Errors
///
/// Returns [`ValidationError::WrongType`], [`ValidationError::TooLarge`] or
/// [`ValidationError::Empty`].
pub fn validate_attributes(
    mime_type: &str,
    size: u64,
    max_size_bytes: u64,
    accepted_types: &[String],
) -> Result<(), ValidationError> {
    if !accepted_types.is_empty() && !accepted_types.iter().any(|t| t == mime_type) {
        return Err(ValidationError::WrongType {
            actual: mime_type.to_string(),
            accepted: accepted_types.to_vec(),
        });
    }

    if size > max_size_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max: max_size_bytes,
        });
    }

    if size == 0 {
        return Err(ValidationError::Empty);
    }

    Ok(())
}

/// Number of chunks needed for `file_size` bytes.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
#[must_use]
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> u64 {
    assert!(chunk_size > 0, "chunk size must be positive");
    file_size.div_ceil(chunk_size)
}

/// Byte range of chunk `index`.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
#[must_use]
pub fn chunk_range(index: u64, file_size: u64, chunk_size: u64) -> Chunk {
    assert!(chunk_size > 0, "chunk size must be positive");
    let start = index.saturating_mul(chunk_size).min(file_size);
    let end = start.saturating_add(chunk_size).min(file_size);
    Chunk { index, start, end }
}

/// All chunks of a file, in dispatch order.
pub fn chunks(file_size: u64, chunk_size: u64) -> impl Iterator<Item = Chunk> {
    (0..plan_chunks(file_size, chunk_size)).map(move |i| chunk_range(i, file_size, chunk_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn pdf(size: usize) -> SourceFile {
        SourceFile::new("book.pdf", "application/pdf", vec![0u8; size])
    }

    fn assert_partition(file_size: u64, chunk_size: u64) {
        let all: Vec<Chunk> = chunks(file_size, chunk_size).collect();
        assert_eq!(all.len() as u64, file_size.div_ceil(chunk_size));

        let mut cursor = 0;
        for (i, chunk) in all.iter().enumerate() {
            assert_eq!(chunk.index, i as u64);
            assert_eq!(chunk.start, cursor, "gap or overlap at chunk {i}");
            assert!(chunk.len() > 0 && chunk.len() <= chunk_size);
            cursor = chunk.end;
        }
        assert_eq!(cursor, file_size);
    }

    #[test]
    fn test_partition_holds_for_many_sizes() {
        for chunk_size in [1, 2, 3, 7, 1024, 5 * MIB] {
            for file_size in [1, 2, 3, 6, 7, 8, 1023, 1024, 1025, 5 * MIB, 12 * MIB + 1] {
                assert_partition(file_size, chunk_size);
            }
        }
    }

    #[test]
    fn test_twelve_mib_in_five_mib_chunks() {
        let all: Vec<Chunk> = chunks(12 * MIB, 5 * MIB).collect();

        assert_eq!(plan_chunks(12 * MIB, 5 * MIB), 3);
        assert_eq!(
            all,
            vec![
                Chunk { index: 0, start: 0, end: 5 * MIB },
                Chunk { index: 1, start: 5 * MIB, end: 10 * MIB },
                Chunk { index: 2, start: 10 * MIB, end: 12 * MIB },
            ]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        assert_eq!(plan_chunks(5 * MIB, 5 * MIB), 1);
        assert_eq!(plan_chunks(10 * MIB, 5 * MIB), 2);
        assert_eq!(chunk_range(0, 5 * MIB, 5 * MIB).end, 5 * MIB);
    }

    #[test]
    fn test_zero_size_plans_no_chunks() {
        assert_eq!(plan_chunks(0, 5 * MIB), 0);
        assert_eq!(chunks(0, 5 * MIB).count(), 0);
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        let file = pdf(6 * 1024 * 1024);
        let result = validate_file(&file, 5 * MIB, &["application/pdf".to_string()]);

        assert_eq!(
            result,
            Err(ValidationError::TooLarge {
                size: 6 * MIB,
                max: 5 * MIB
            })
        );
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let file = SourceFile::new("cover.png", "image/png", vec![1u8; 10]);
        let result = validate_file(&file, 5 * MIB, &["application/pdf".to_string()]);

        assert!(matches!(result, Err(ValidationError::WrongType { ref actual, .. }) if actual == "image/png"));
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let result = validate_file(&pdf(0), 5 * MIB, &[]);
        assert_eq!(result, Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_accepts_any_type_with_empty_allow_list() {
        let file = SourceFile::new("track.ogg", "audio/ogg", vec![1u8; 10]);
        assert_eq!(validate_file(&file, 5 * MIB, &[]), Ok(()));
    }

    #[test]
    fn test_validate_size_limit_is_inclusive() {
        let file = pdf(1024);
        assert_eq!(validate_file(&file, 1024, &[]), Ok(()));
    }
}
