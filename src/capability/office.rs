use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_command, ConvertTarget, DeckConverter};
use crate::error::{Error, Result};

/// Converts decks with a headless LibreOffice.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    program: PathBuf,
}

impl LibreOfficeConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for LibreOfficeConverter {
    fn default() -> Self {
        Self::new("libreoffice")
    }
}

#[async_trait]
impl DeckConverter for LibreOfficeConverter {
    async fn convert(
        &self,
        deck: &Path,
        out_dir: &Path,
        target: ConvertTarget,
    ) -> Result<PathBuf> {
        let stem = deck
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::capability("libreoffice", format!("no file stem: {}", deck.display())))?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg(target.extension())
            .arg("--outdir")
            .arg(out_dir)
            .arg(deck);

        log::debug!(
            "Converting {} to {} in {}",
            deck.display(),
            target.extension(),
            out_dir.display()
        );
        run_command("libreoffice", &mut cmd).await?;

        let output = out_dir.join(format!("{stem}.{}", target.extension()));
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(Error::capability(
                "libreoffice",
                format!("expected output {} was not produced", output.display()),
            ));
        }
        Ok(output)
    }
}
