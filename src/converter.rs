//! DOCX to PDF conversion through headless LibreOffice

use crate::error::{DigestError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Binaries tried in order when locating LibreOffice
const CANDIDATE_BINARIES: &[&str] = &["libreoffice", "soffice"];

/// File name of the digest PDF for a given date
pub fn digest_file_name(date: NaiveDate) -> String {
    format!("{} Current Affairs.pdf", date.format("%d-%m-%Y"))
}

/// Converts documents with a LibreOffice binary
#[derive(Debug, Clone)]
pub struct PdfConverter {
    binary: PathBuf,
}

impl PdfConverter {
    /// Use a specific binary
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Find `libreoffice` (or `soffice`) on PATH
    pub fn locate() -> Result<Self> {
        CANDIDATE_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| Self::new(path))
            .ok_or_else(|| {
                DigestError::ConversionFailed(format!(
                    "none of {:?} found on PATH",
                    CANDIDATE_BINARIES
                ))
            })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Convert `docx_path` into a PDF at `pdf_path`
    ///
    /// LibreOffice writes `<stem>.pdf` next to the requested output; the file
    /// is then moved to `pdf_path`.
    pub async fn convert(&self, docx_path: &Path, pdf_path: &Path) -> Result<()> {
        info!("Converting {} to PDF", docx_path.display());

        let out_dir = pdf_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(docx_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DigestError::ConversionFailed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());

        let produced = converted_path(docx_path, out_dir)?;
        if !produced.exists() {
            return Err(DigestError::ConversionFailed(format!(
                "expected output {} was not produced",
                produced.display()
            )));
        }
        if produced.as_path() != pdf_path {
            tokio::fs::rename(&produced, pdf_path).await?;
        }

        info!("PDF written to {}", pdf_path.display());
        Ok(())
    }
}

/// Path LibreOffice writes for `docx_path` inside `out_dir`
fn converted_path(docx_path: &Path, out_dir: &Path) -> Result<PathBuf> {
    let stem = docx_path
        .file_stem()
        .ok_or_else(|| DigestError::ConversionFailed(format!("invalid input {}", docx_path.display())))?;
    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(out_dir.join(name))
}
