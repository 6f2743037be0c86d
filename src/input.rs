//! Input resolution: turn a user-supplied path or URL into an [`InputFile`].
//!
//! Conversions run on bytes plus a file name. The name matters: its
//! extension is what the validators check the declared format against and
//! what the transcoder uses to pick a demuxer. URLs keep the last path
//! segment as their name, or get one from the response's content type.

use crate::error::ConvertError;
use crate::format::{detect_format, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A file to convert: its name and its full contents.
#[derive(Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file; the name is its final path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = read_local(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    /// Give an extensionless name the extension of `declared`.
    ///
    /// Downloads named `download` and bare local paths carry no extension,
    /// so an explicit source format is the only evidence of their type.
    /// A name with a recognized extension is left as is and still goes
    /// through the mismatch check.
    pub fn with_declared_format(mut self, declared: FileFormat) -> Self {
        if detect_format(&self.name).is_none() {
            let named = format!("{}.{}", self.name, declared.extension());
            debug!("Naming extensionless input '{}' as '{}'", self.name, named);
            self.name = named;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or HTTP(S) URL to an [`InputFile`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, ConvertError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(ConvertError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        InputFile::from_path(input).await
    }
}

/// Read a local file, mapping the common failures to friendly errors.
async fn read_local(path: &Path) -> Result<Vec<u8>, ConvertError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConvertError::FileNotFound {
            path: PathBuf::from(path),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ConvertError::PermissionDenied {
                path: PathBuf::from(path),
            })
        }
        Err(e) => Err(ConvertError::Io(e)),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, ConvertError> {
    info!("Downloading {}", url);

    let failed = |reason: String| ConvertError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
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

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let name = extract_filename(url, content_type.as_deref());

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(InputFile::new(name, bytes.to_vec()))
}

/// Name for a downloaded file: the URL's last path segment when it has an
/// extension, else `download.<ext>` from the content type, else `download`.
pub fn extract_filename(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    if let Some(format) = mime.and_then(|m| FileFormat::ALL.into_iter().find(|f| f.mime_type() == m)) {
        return format!("download.{}", format.extension());
    }

    "download".to_string()
}
