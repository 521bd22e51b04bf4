//! Blob names are `<epoch-ms>_<filename>`, so two uploads only collide when
//! they carry the same filename within the same millisecond.

use crate::{BlobError, BlobResult};

/// Reduces a client supplied filename to its last path component.
pub fn sanitize_filename(original_filename: &str) -> BlobResult<&str> {
    let filename = original_filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(BlobError::InvalidName {
            name: original_filename.to_string(),
            reason: "filename must not be empty".to_string(),
        });
    }
    Ok(filename)
}

pub fn blob_name(timestamp_ms: u64, filename: &str) -> String {
    format!("{}_{}", timestamp_ms, filename)
}

/// Checks that a name can be used as a single key within the bucket.
pub fn validate_blob_name(name: &str) -> BlobResult<()> {
    if name.is_empty() {
        return Err(BlobError::InvalidName {
            name: name.to_string(),
            reason: "blob name must not be empty".to_string(),
        });
    }
    if name.contains('/') || name.contains('\\') {
        return Err(BlobError::InvalidName {
            name: name.to_string(),
            reason: "blob name must not contain path separators".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_format() {
        assert_eq!(blob_name(1700000000123, "cat.png"), "1700000000123_cat.png");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\dog.jpg").unwrap(), "dog.jpg");
        assert_eq!(sanitize_filename("  spaced.gif ").unwrap(), "spaced.gif");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        for name in ["", "   ", "photos/", "..", "a/.."] {
            let err = sanitize_filename(name).unwrap_err();
            assert!(err.is_invalid_input(), "{name:?} gave {err:?}");
        }
    }

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("1700000000123_cat.png").is_ok());
        assert!(validate_blob_name("missing_blob").is_ok());
        assert!(validate_blob_name("").is_err());
        assert!(validate_blob_name("a/b").is_err());
    }
}
