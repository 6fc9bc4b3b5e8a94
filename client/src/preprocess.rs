use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};
use shared::{EncodeFormat, ErrorKind, ImageAsset, PreprocessSpec};
use std::path::PathBuf;
use std::sync::Arc;

use crate::acquisition::{AcquireError, file_uri, local_path};

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Cannot resolve source image: {0}")]
    Source(#[from] AcquireError),
    #[error("Cannot read source image {0}")]
    Unreadable(String),
    #[error("Codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported preprocessing spec: {0:?}")]
    InvalidSpec(PreprocessSpec),
    #[error("Encoding task failed: {0}")]
    Task(String),
}

impl PreprocessError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::EncodingError
    }
}

/// Re-encodes raw image bytes to the target dimensions and quality.
pub trait ImageCodec: Send + Sync {
    fn reencode(&self, source: &[u8], spec: &PreprocessSpec) -> Result<Vec<u8>, PreprocessError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn reencode(&self, source: &[u8], spec: &PreprocessSpec) -> Result<Vec<u8>, PreprocessError> {
        let EncodeFormat::Jpeg = spec.format;
        let decoded = image::load_from_memory(source)?;
        // Fits inside the target box, aspect ratio kept.
        let resized = decoded.resize(spec.target_width, spec.target_height, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, spec.quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
        Ok(out)
    }
}

#[derive(Clone)]
pub struct Preprocessor {
    codec: Arc<dyn ImageCodec>,
    work_dir: PathBuf,
}

impl Preprocessor {
    pub fn new(codec: Arc<dyn ImageCodec>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            codec,
            work_dir: work_dir.into(),
        }
    }

    pub fn jpeg(work_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JpegCodec), work_dir)
    }

    /// Output name is derived from the source bytes and the resize settings, so the same
    /// input always lands on the same file.
    pub fn output_name(source: &[u8], spec: &PreprocessSpec) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source);
        hasher.update(spec.target_width.to_le_bytes());
        hasher.update(spec.target_height.to_le_bytes());
        hasher.update([spec.quality]);
        format!("{}.jpg", hex::encode(hasher.finalize()))
    }

    pub async fn preprocess(
        &self,
        asset: &ImageAsset,
        spec: &PreprocessSpec,
    ) -> Result<ImageAsset, PreprocessError> {
        if !spec.is_valid() {
            return Err(PreprocessError::InvalidSpec(*spec));
        }

        let path = local_path(asset)?;
        let source = tokio::fs::read(&path)
            .await
            .map_err(|e| PreprocessError::Unreadable(format!("{}: {}", path.display(), e)))?;

        let output = self.work_dir.join(Self::output_name(&source, spec));
        let codec = Arc::clone(&self.codec);
        let spec = *spec;
        let encoded = tokio::task::spawn_blocking(move || codec.reencode(&source, &spec))
            .await
            .map_err(|e| PreprocessError::Task(e.to_string()))??;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        tokio::fs::write(&output, &encoded).await?;
        log::debug!(
            "Preprocessed {} to {}x{} q{} ({} bytes)",
            asset.uri,
            spec.target_width,
            spec.target_height,
            spec.quality,
            encoded.len()
        );

        Ok(ImageAsset::new(file_uri(&output), "image/jpeg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::path::Path;

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("leaf.png");
        RgbImage::from_pixel(width, height, Rgb([40, 160, 60]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn resizes_within_target_and_encodes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), 640, 480);
        let asset = ImageAsset::new(file_uri(&source), "image/png");
        let preprocessor = Preprocessor::jpeg(dir.path().join("work"));

        let out = preprocessor
            .preprocess(&asset, &PreprocessSpec::jpeg(224, 224, 90))
            .await
            .unwrap();

        assert_eq!(out.mime_type, "image/jpeg");
        let out_path = local_path(&out).unwrap();
        assert!(out_path.starts_with(dir.path().join("work")));
        let decoded = image::open(&out_path).unwrap();
        assert_eq!(decoded.dimensions(), (224, 168));
        assert_eq!(
            image::ImageFormat::from_path(&out_path).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[tokio::test]
    async fn same_input_maps_to_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), 100, 100);
        let asset = ImageAsset::new(file_uri(&source), "image/png");
        let preprocessor = Preprocessor::jpeg(dir.path());
        let spec = PreprocessSpec::jpeg(800, 600, 80);

        let first = preprocessor.preprocess(&asset, &spec).await.unwrap();
        let second = preprocessor.preprocess(&asset, &spec).await.unwrap();
        assert_eq!(first, second);

        let other = preprocessor
            .preprocess(&asset, &PreprocessSpec::jpeg(224, 224, 90))
            .await
            .unwrap();
        assert_ne!(first.uri, other.uri);
    }

    #[tokio::test]
    async fn corrupt_source_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();
        let asset = ImageAsset::new(file_uri(&source), "image/jpeg");

        let err = Preprocessor::jpeg(dir.path())
            .preprocess(&asset, &PreprocessSpec::jpeg(224, 224, 90))
            .await
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Codec(_)));
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[tokio::test]
    async fn missing_source_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let asset = ImageAsset::new(file_uri(&dir.path().join("gone.jpg")), "image/jpeg");

        let err = Preprocessor::jpeg(dir.path())
            .preprocess(&asset, &PreprocessSpec::jpeg(224, 224, 90))
            .await
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Unreadable(_)));
    }

    #[tokio::test]
    async fn rejects_out_of_range_spec() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), 10, 10);
        let asset = ImageAsset::new(file_uri(&source), "image/png");

        let err = Preprocessor::jpeg(dir.path())
            .preprocess(&asset, &PreprocessSpec::jpeg(0, 224, 90))
            .await
            .unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidSpec(_)));
    }
}
