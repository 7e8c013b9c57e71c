//! Input format sniffing.
//!
//! The declared kind decides dispatch; these checks only confirm that the
//! bytes can plausibly be opened as that kind before any extractor runs.

use crate::error::{Error, Result};

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Offset of the `%PDF-` marker (some producers prepend garbage)
    pub header_offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"
/// Readers accept the header anywhere in the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// ZIP local file header, the container of OOXML decks.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE2 compound document, the container of legacy `.ppt` decks.
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Detect the PDF header in `data`.
///
/// # Returns
/// * `Ok(PdfFormat)` if a valid header appears in the first kilobyte
/// * `Err(Error::UnknownFormat)` otherwise
pub fn detect_pdf(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let version_start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnknownFormat);
    }

    Ok(PdfFormat {
        version,
        header_offset: offset,
    })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    let chars: Vec<char> = version.chars().collect();
    chars.len() == 3 && chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}

/// Check if bytes are a ZIP container (OOXML deck).
pub fn is_zip_bytes(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Check if bytes are an OLE2 compound document (legacy deck).
pub fn is_ole_bytes(data: &[u8]) -> bool {
    data.starts_with(OLE_MAGIC)
}

/// Detect a raster image format from magic bytes.
pub fn detect_image(data: &[u8]) -> Result<image::ImageFormat> {
    image::guess_format(data).map_err(|_| Error::UnknownFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let format = detect_pdf(data).unwrap();
        assert_eq!(format.version, "1.7");
        assert_eq!(format.header_offset, 0);
    }

    #[test]
    fn test_detect_pdf_with_leading_garbage() {
        let data = b"\r\n\r\n%PDF-1.4\n";
        let format = detect_pdf(data).unwrap();
        assert_eq!(format.version, "1.4");
        assert_eq!(format.header_offset, 4);
    }

    #[test]
    fn test_detect_invalid_format() {
        assert!(matches!(
            detect_pdf(b"<!DOCTYPE html>"),
            Err(Error::UnknownFormat)
        ));
        assert!(matches!(detect_pdf(b"%PDF"), Err(Error::UnknownFormat)));
        assert!(matches!(detect_pdf(b"%PDF-x.y"), Err(Error::UnknownFormat)));
        assert!(matches!(detect_pdf(b""), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_container_magic() {
        assert!(is_zip_bytes(b"PK\x03\x04rest"));
        assert!(!is_zip_bytes(b"%PDF-1.4"));
        assert!(is_ole_bytes(&[
            0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00
        ]));
    }

    #[test]
    fn test_detect_image() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(detect_image(png).unwrap(), image::ImageFormat::Png);
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_image(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        assert!(detect_image(b"hello world").is_err());
    }

    #[test]
    fn test_version_validation() {
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("2.0"));
        assert!(!is_valid_version("10.0"));
        assert!(!is_valid_version("abc"));
    }
}
