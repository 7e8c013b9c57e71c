use async_trait::async_trait;

use super::{GraphClassifier, ImageDescriber};
use crate::error::Result;

/// Vision stand-in used when no model is configured.
///
/// Classifies nothing as a graph and describes everything with an empty
/// string, so image and table units carry only their captions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVision;

#[async_trait]
impl GraphClassifier for NoVision {
    async fn is_graph(&self, _image: &[u8]) -> Result<bool> {
        Ok(false)
    }
}

#[async_trait]
impl ImageDescriber for NoVision {
    async fn describe_image(&self, _image: &[u8]) -> Result<String> {
        Ok(String::new())
    }

    async fn describe_graph(&self, _image: &[u8]) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_vision() {
        assert!(!NoVision.is_graph(b"png").await.unwrap());
        assert_eq!(NoVision.describe_image(b"png").await.unwrap(), "");
        assert_eq!(NoVision.describe_graph(b"png").await.unwrap(), "");
    }
}
