use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use super::{ExtractedText, GenericExtractor};
use crate::error::{Error, Result};

/// Reads UTF-8 text files as a single document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl GenericExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedText>> {
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::ExtractionFailed(format!("{} is not UTF-8 text", path.display())))?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("byte_length".to_string(), json!(text.len()));
        metadata.insert("line_count".to_string(), json!(text.lines().count()));
        Ok(vec![ExtractedText { text, metadata }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\nline two\n").unwrap();

        let out = PlainTextExtractor.extract(&path).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "# Notes\nline two\n");
        assert_eq!(out[0].metadata["line_count"], json!(2));
    }

    #[tokio::test]
    async fn test_binary_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        assert!(PlainTextExtractor.extract(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_whitespace_only_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\t").unwrap();
        assert!(PlainTextExtractor.extract(&path).await.unwrap().is_empty());
    }
}
