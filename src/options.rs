//! Ingestion options and configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Options controlling a batch ingestion.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Directory under which per-batch working directories are created
    /// (system temp directory when `None`)
    pub working_root: Option<PathBuf>,

    /// Ceiling for a single table, image or slide extraction
    pub item_timeout: Duration,

    /// Ceiling for converting a slide deck to a paginated document
    pub conversion_timeout: Duration,

    /// Fraction of the page height treated as running header/footer band
    pub margin_ratio: f32,

    /// Images narrower than `page_width / divisor` or shorter than
    /// `page_height / divisor` are ignored
    pub min_image_divisor: f32,

    /// Fraction of the page height searched above and below a table or
    /// image for surrounding text
    pub caption_window_ratio: f32,

    /// Body characters after which a text group is split
    pub max_group_chars: usize,

    /// Also drop text groups that overlap accepted images
    pub suppress_image_regions: bool,

    /// Parse PDF pages on multiple threads
    pub parallel: bool,

    /// Ruled table detection settings
    pub table: TableDetectorConfig,
}

impl IngestOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working root directory.
    pub fn with_working_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.working_root = Some(root.into());
        self
    }

    /// Set the per-item timeout.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Set the slide deck conversion timeout.
    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Set the header/footer band ratio.
    pub fn with_margin_ratio(mut self, ratio: f32) -> Self {
        self.margin_ratio = ratio;
        self
    }

    /// Set the trivial image divisor.
    pub fn with_min_image_divisor(mut self, divisor: f32) -> Self {
        self.min_image_divisor = divisor;
        self
    }

    /// Set the caption search window ratio.
    pub fn with_caption_window(mut self, ratio: f32) -> Self {
        self.caption_window_ratio = ratio;
        self
    }

    /// Set the text group split threshold.
    pub fn with_max_group_chars(mut self, chars: usize) -> Self {
        self.max_group_chars = chars;
        self
    }

    /// Enable or disable suppression of text overlapping images.
    pub fn with_image_suppression(mut self, suppress: bool) -> Self {
        self.suppress_image_regions = suppress;
        self
    }

    /// Enable or disable parallel page parsing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel page parsing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set table detection settings.
    pub fn with_table_config(mut self, config: TableDetectorConfig) -> Self {
        self.table = config;
        self
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            working_root: None,
            item_timeout: Duration::from_secs(20),
            conversion_timeout: Duration::from_secs(120),
            margin_ratio: 0.1,
            min_image_divisor: 20.0,
            caption_window_ratio: 0.1,
            max_group_chars: 500,
            suppress_image_regions: false,
            parallel: true,
            table: TableDetectorConfig::default(),
        }
    }
}

/// Ruled table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Distance within which rule coordinates are merged (points)
    pub snap_tolerance: f32,
    /// Rules shorter than this are ignored (points)
    pub min_rule_length: f32,
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Minimum number of cells to consider as table
    pub min_cells: usize,
    /// Fraction of the page height at the bottom (previous page) and top
    /// (current page) where a table is treated as a continuation
    pub continuation_band_ratio: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: 3.0,
            min_rule_length: 10.0,
            min_rows: 1,
            min_columns: 1,
            min_cells: 2,
            continuation_band_ratio: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_options_builder() {
        let options = IngestOptions::new()
            .with_working_root("/var/tmp/ingest")
            .with_item_timeout(Duration::from_secs(5))
            .with_max_group_chars(800)
            .with_image_suppression(true)
            .sequential();

        assert_eq!(options.working_root, Some(PathBuf::from("/var/tmp/ingest")));
        assert_eq!(options.item_timeout, Duration::from_secs(5));
        assert_eq!(options.max_group_chars, 800);
        assert!(options.suppress_image_regions);
        assert!(!options.parallel);
    }

    #[test]
    fn test_default_options() {
        let options = IngestOptions::default();
        assert_eq!(options.item_timeout, Duration::from_secs(20));
        assert_eq!(options.margin_ratio, 0.1);
        assert_eq!(options.min_image_divisor, 20.0);
        assert_eq!(options.caption_window_ratio, 0.1);
        assert!(options.parallel);
        assert_eq!(options.table.min_cells, 2);
    }
}
