//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! pdfium opens documents from a file-system path, so URLs are downloaded
//! into a `TempDir` that lives as long as the [`ResolvedInput`]. In-memory
//! bytes go through the same temp-file route. The `%PDF` magic is checked
//! before anything reaches pdfium.

use crate::error::Pdf2MarkupError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A local PDF path, possibly backed by a temporary directory.
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded or materialised from bytes; removed on drop.
    Temporary { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` (path or HTTP/HTTPS URL) to a readable local PDF.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, Pdf2MarkupError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(Pdf2MarkupError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(input)
    }
}

/// Write in-memory PDF bytes to a managed temp file.
pub async fn materialise_bytes(bytes: &[u8]) -> Result<ResolvedInput, Pdf2MarkupError> {
    let temp_dir = TempDir::new().map_err(|e| Pdf2MarkupError::Internal(e.to_string()))?;
    let path = temp_dir.path().join("input.pdf");
    check_magic(&path, bytes)?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Pdf2MarkupError::Internal(format!("Failed to write temp file: {}", e)))?;
    Ok(ResolvedInput::Temporary {
        path,
        _temp_dir: temp_dir,
    })
}

fn check_magic(path: &Path, head: &[u8]) -> Result<(), Pdf2MarkupError> {
    if head.len() >= 4 && &head[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[..4]);
        return Err(Pdf2MarkupError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2MarkupError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2MarkupError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() {
                check_magic(&path, &magic)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MarkupError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2MarkupError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2MarkupError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Pdf2MarkupError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2MarkupError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let temp_dir = TempDir::new().map_err(|e| Pdf2MarkupError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    check_magic(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2MarkupError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Temporary {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
