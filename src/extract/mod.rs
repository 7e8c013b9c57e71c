//! Per-kind extractors that turn parsed pages, slides and images into
//! content units.
//!
//! A page runs tables, then images, then text through one [`PageState`];
//! each table or image is processed under the per-item ceiling and dropped
//! on failure without affecting its siblings.

mod caption;
mod image;
mod page;
mod slides;
mod table;
mod table_grid;
mod text;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

pub use caption::{compose_caption, text_around};
pub use page::{PageExtractor, PageOutput, PageState};
pub use slides::SlideExtractor;
pub use table_grid::{detect_ruled_tables, TableContinuation, TableGrid};
pub use text::{group_blocks, BlockGroup, FontHeadingDetector, HeadingDetector};

/// Run `future` with a hard ceiling.
///
/// On expiry the future is dropped, so anything it owned (including an
/// uncommitted [`ArtifactGuard`](crate::workspace::ArtifactGuard)) is
/// released before the timeout is reported.
pub async fn with_timeout<T, F>(item: &str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::ExtractionTimeout {
            item: item.to_string(),
            limit,
        }),
    }
}

/// Batch-wide cancellation signal, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Work already finished is kept.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_reports_item() {
        let result: Result<()> = with_timeout("doc-page0-table1", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(Error::ExtractionTimeout { item, limit }) => {
                assert_eq!(item, "doc-page0-table1");
                assert_eq!(limit, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_passes_result_through() {
        let value = with_timeout("x", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);

        let failed: Result<()> = with_timeout("x", Duration::from_secs(1), async {
            Err(Error::ExtractionFailed("boom".into()))
        })
        .await;
        assert!(matches!(failed, Err(Error::ExtractionFailed(_))));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(Error::Cancelled)));
    }
}
