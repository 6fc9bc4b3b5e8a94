use async_trait::async_trait;
use shared::ImageAsset;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    Gallery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Acquired(ImageAsset),
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("Unable to open {source_name}: {reason}")]
    Unavailable { source_name: &'static str, reason: String },
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid image uri: {0}")]
    InvalidUri(String),
}

impl AcquireError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AcquireError::Unavailable { source_name: "camera", .. } => "Unable to open camera",
            AcquireError::Unavailable { .. } => "Unable to open gallery",
            AcquireError::UnsupportedFormat(_) => "This file type is not supported, choose a photo.",
            AcquireError::InvalidUri(_) => "Unable to read the selected photo.",
        }
    }
}

impl ImageSource {
    fn name(&self) -> &'static str {
        match self {
            ImageSource::Camera => "camera",
            ImageSource::Gallery => "gallery",
        }
    }
}

/// Native "pick or capture a photo" capability.
#[async_trait(?Send)]
pub trait PhotoPicker {
    async fn pick(&self, source: ImageSource) -> Result<AcquireOutcome, AcquireError>;
}

pub fn mime_type_for(path: &Path) -> Result<&'static str, AcquireError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "gif" => Ok("image/gif"),
        _ => Err(AcquireError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Resolves an asset uri to a local path. Accepts `file://` urls and bare paths.
pub fn local_path(asset: &ImageAsset) -> Result<PathBuf, AcquireError> {
    if asset.uri.starts_with("file://") {
        let url = Url::parse(&asset.uri).map_err(|e| AcquireError::InvalidUri(e.to_string()))?;
        url.to_file_path()
            .map_err(|_| AcquireError::InvalidUri(asset.uri.clone()))
    } else if asset.uri.contains("://") {
        Err(AcquireError::InvalidUri(asset.uri.clone()))
    } else {
        Ok(PathBuf::from(&asset.uri))
    }
}

pub fn file_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|_| absolute.display().to_string())
}

/// Picker backed by files already on disk: each source is either bound to a
/// path or unset, in which case picking from it counts as a cancellation.
#[derive(Debug, Clone, Default)]
pub struct FilePicker {
    camera: Option<PathBuf>,
    gallery: Option<PathBuf>,
}

impl FilePicker {
    pub fn new(camera: Option<PathBuf>, gallery: Option<PathBuf>) -> Self {
        Self { camera, gallery }
    }

    pub fn gallery(path: impl Into<PathBuf>) -> Self {
        Self::new(None, Some(path.into()))
    }

    pub fn camera(path: impl Into<PathBuf>) -> Self {
        Self::new(Some(path.into()), None)
    }
}

#[async_trait(?Send)]
impl PhotoPicker for FilePicker {
    async fn pick(&self, source: ImageSource) -> Result<AcquireOutcome, AcquireError> {
        let selected = match source {
            ImageSource::Camera => self.camera.as_ref(),
            ImageSource::Gallery => self.gallery.as_ref(),
        };
        let Some(path) = selected else {
            log::info!("User cancelled {} picker", source.name());
            return Ok(AcquireOutcome::Cancelled);
        };

        let mime_type = mime_type_for(path)?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AcquireError::Unavailable {
                source_name: source.name(),
                reason: format!("{}: {}", path.display(), e),
            })?;
        if !metadata.is_file() {
            return Err(AcquireError::Unavailable {
                source_name: source.name(),
                reason: format!("{} is not a file", path.display()),
            });
        }

        let asset = ImageAsset::new(file_uri(path), mime_type);
        log::debug!("Acquired {} from {}", asset.uri, source.name());
        Ok(AcquireOutcome::Acquired(asset))
    }
}
