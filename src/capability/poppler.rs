use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_command, PageRasterizer};
use crate::error::{Error, Result};
use crate::geometry::BoundingBox;

/// Renders pages with Poppler's `pdftoppm` at 72 dpi, so one pixel is one
/// point and page-space clips map directly onto pixel crops.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    program: PathBuf,
}

impl PopplerRasterizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

#[async_trait]
impl PageRasterizer for PopplerRasterizer {
    async fn rasterize(
        &self,
        document: &Path,
        page_index: usize,
        clip: Option<BoundingBox>,
    ) -> Result<Vec<u8>> {
        let page = (page_index + 1).to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(["-png", "-r", "72", "-singlefile", "-f", &page, "-l", &page]);

        if let Some(clip) = clip {
            let x = clip.x1.max(0.0).floor() as i64;
            let y = clip.y1.max(0.0).floor() as i64;
            let w = clip.width().ceil().max(1.0) as i64;
            let h = clip.height().ceil().max(1.0) as i64;
            cmd.args([
                "-x",
                &x.to_string(),
                "-y",
                &y.to_string(),
                "-W",
                &w.to_string(),
                "-H",
                &h.to_string(),
            ]);
        }
        // Without an output root pdftoppm writes the image to stdout
        cmd.arg(document);

        let png = run_command("pdftoppm", &mut cmd).await?;
        if png.is_empty() {
            return Err(Error::capability("pdftoppm", "produced no image"));
        }
        Ok(png)
    }
}
