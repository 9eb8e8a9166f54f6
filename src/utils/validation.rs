use anyhow::{Result, anyhow};

/// Maximum image size accepted by the pipeline: 50 MB
pub const MAX_IMAGE_SIZE: usize = 50 * 1024 * 1024;

/// Image MIME types the storage and face services accept
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "image/heif",
    "image/heic",
    "image/avif",
];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        }));
    }
    Ok(())
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return true;
    }

    // PE/COFF
    if header.starts_with(&[0x4D, 0x5A]) {
        return true;
    }

    // Mach-O
    if header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
    {
        return true;
    }

    header.starts_with(b"#!")
}

/// Validates an image before it is sent anywhere and returns its MIME type
pub fn validate_image(bytes: &[u8], max_size: usize) -> Result<&'static str> {
    validate_file_size(bytes.len(), max_size)?;

    if is_executable_content(bytes) {
        return Err(anyhow!(ValidationError {
            code: "EXECUTABLE_CONTENT",
            message: "File contains executable content which is not allowed".to_string(),
        }));
    }

    let mime = infer::get(bytes)
        .map(|kind| kind.mime_type())
        .ok_or_else(|| {
            anyhow!(ValidationError {
                code: "UNKNOWN_TYPE",
                message: "Could not determine file type from content".to_string(),
            })
        })?;

    if !ALLOWED_IMAGE_TYPES.contains(&mime) {
        return Err(anyhow!(ValidationError {
            code: "NOT_AN_IMAGE",
            message: format!("Detected type '{}' is not a supported image", mime),
        }));
    }

    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, MAX_IMAGE_SIZE).is_ok());
        assert!(validate_file_size(MAX_IMAGE_SIZE, MAX_IMAGE_SIZE).is_ok());
        assert!(validate_file_size(MAX_IMAGE_SIZE + 1, MAX_IMAGE_SIZE).is_err());
        assert!(validate_file_size(0, MAX_IMAGE_SIZE).is_err());
    }

    #[test]
    fn test_is_executable_content() {
        assert!(is_executable_content(&[0x7F, 0x45, 0x4C, 0x46, 0x00]));
        assert!(is_executable_content(&[0x4D, 0x5A, 0x00, 0x00]));
        assert!(is_executable_content(b"#!/bin/bash"));
        assert!(!is_executable_content(b"Hello World"));
        assert!(!is_executable_content(PNG_HEADER));
    }

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image(JPEG_HEADER, MAX_IMAGE_SIZE).unwrap(), "image/jpeg");
        assert_eq!(validate_image(PNG_HEADER, MAX_IMAGE_SIZE).unwrap(), "image/png");

        assert!(validate_image(b"%PDF-1.5 not an image", MAX_IMAGE_SIZE).is_err());
        assert!(validate_image(b"plain text", MAX_IMAGE_SIZE).is_err());
        assert!(validate_image(&[0x4D, 0x5A, 0x00, 0x00], MAX_IMAGE_SIZE).is_err());
        assert!(validate_image(b"", MAX_IMAGE_SIZE).is_err());
    }
}
