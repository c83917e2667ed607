use crate::common::{ImageBlob, ImageSource};
use crate::error::AppError;
use image::ImageFormat;
use std::path::Path;
use tracing::{debug, warn};

/// What a file picker hands over: a name, the declared MIME type and the bytes.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its MIME type from the extension the
    /// way a browser file picker does.
    pub async fn from_path(path: &Path) -> Result<Self, AppError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = declared_mime_type(path);
        debug!(
            "Read {} ({} bytes, declared {})",
            name,
            bytes.len(),
            mime_type
        );
        Ok(Self::new(name, mime_type, bytes))
    }
}

fn declared_mime_type(path: &Path) -> String {
    match ImageFormat::from_path(path) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => "application/octet-stream".to_string(),
    }
}

/// Accepts a picked file as an [`ImageBlob`] if it declares an image type.
pub fn select_file(file: SelectedFile) -> Result<ImageBlob, AppError> {
    let declared = file.mime_type.trim().to_ascii_lowercase();
    if !declared.starts_with("image/") {
        warn!("Rejected {}: declared type {:?}", file.name, file.mime_type);
        return Err(AppError::InvalidInput(format!(
            "{} is not an image (declared type {})",
            file.name, file.mime_type
        )));
    }
    if file.bytes.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is empty", file.name)));
    }
    Ok(ImageBlob::new(
        file.bytes,
        declared,
        ImageSource::File { name: file.name },
    ))
}
