use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use shared::{BackendKind, ErrorKind, ImageAsset};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::acquisition::local_path;
use crate::config::AppConfig;

pub const IMAGE_FIELD: &str = "image";
pub const UPLOAD_FILE_NAME: &str = "photo.jpg";
pub const UPLOAD_MIME: &str = "image/jpeg";

/// Decoded JSON body of a successful prediction call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Cannot read upload image: {0}")]
    Upload(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Server error: HTTP {0}")]
    Server(u16),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("No endpoint configured for {0}")]
    NoEndpoint(BackendKind),
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::Upload(_) => ErrorKind::EncodingError,
            PredictError::Network(_) | PredictError::NoEndpoint(_) => ErrorKind::NetworkError,
            PredictError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            PredictError::Server(status) => ErrorKind::ServerError(*status),
            PredictError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for PredictError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PredictError::Network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            PredictError::Malformed(err.to_string())
        } else {
            PredictError::Network(err.to_string())
        }
    }
}

pub fn check_status(status: StatusCode) -> Result<(), PredictError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::PAYLOAD_TOO_LARGE {
        Err(PredictError::PayloadTooLarge)
    } else {
        Err(PredictError::Server(status.as_u16()))
    }
}

/// Issues one prediction request. Implementations make a single attempt.
#[async_trait(?Send)]
pub trait Predictor {
    async fn predict(
        &self,
        image: &ImageAsset,
        backend: BackendKind,
    ) -> Result<RawResponse, PredictError>;
}

#[derive(Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    endpoints: HashMap<BackendKind, Url>,
}

impl PredictionClient {
    pub fn new(endpoints: HashMap<BackendKind, Url>, timeout: Duration) -> Result<Self, PredictError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictError::Network(e.to_string()))?;
        Ok(Self { http, endpoints })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PredictError> {
        let mut endpoints = HashMap::new();
        for backend in BackendKind::all() {
            let url = config
                .endpoint(backend)
                .map_err(|_| PredictError::NoEndpoint(backend))?;
            endpoints.insert(backend, url);
        }
        Self::new(endpoints, config.timeout())
    }

    pub fn endpoint(&self, backend: BackendKind) -> Option<&Url> {
        self.endpoints.get(&backend)
    }

    async fn build_form(image: &ImageAsset) -> Result<Form, PredictError> {
        let path = local_path(image).map_err(|e| PredictError::Upload(e.to_string()))?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| PredictError::Upload(format!("{}: {}", path.display(), e)))?;
        let part = Part::bytes(bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(UPLOAD_MIME)?;
        Ok(Form::new().part(IMAGE_FIELD, part))
    }
}

#[async_trait(?Send)]
impl Predictor for PredictionClient {
    async fn predict(
        &self,
        image: &ImageAsset,
        backend: BackendKind,
    ) -> Result<RawResponse, PredictError> {
        let endpoint = self
            .endpoint(backend)
            .cloned()
            .ok_or(PredictError::NoEndpoint(backend))?;
        let form = Self::build_form(image).await?;

        log::info!("Sending {} prediction to {}", backend, endpoint);
        let response = self
            .http
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                log::error!("{} request failed: {:?}", backend, e);
                PredictError::from(e)
            })?;

        let status = response.status();
        if let Err(e) = check_status(status) {
            log::warn!("{} prediction rejected with HTTP {}", backend, status);
            return Err(e);
        }

        let text = response.text().await?;
        let body = serde_json::from_str(&text).map_err(|e| PredictError::Malformed(e.to_string()))?;
        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_distinguishes_payload_too_large() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(check_status(StatusCode::CREATED).is_ok());
        assert!(matches!(
            check_status(StatusCode::PAYLOAD_TOO_LARGE),
            Err(PredictError::PayloadTooLarge)
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_REQUEST),
            Err(PredictError::Server(400))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY),
            Err(PredictError::Server(502))
        ));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(PredictError::PayloadTooLarge.kind(), ErrorKind::PayloadTooLarge);
        assert_eq!(PredictError::Server(503).kind(), ErrorKind::ServerError(503));
        assert_eq!(
            PredictError::Network("refused".into()).kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(
            PredictError::Malformed("eof".into()).kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            PredictError::Upload("gone".into()).kind(),
            ErrorKind::EncodingError
        );
    }

    #[tokio::test]
    async fn unreadable_upload_fails_before_sending() {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            BackendKind::Tensorflow,
            Url::parse("http://127.0.0.1:9/api/tensorflow/predict").unwrap(),
        );
        let client = PredictionClient::new(endpoints, Duration::from_secs(1)).unwrap();
        let image = ImageAsset::new("/no/such/photo.jpg", "image/jpeg");

        let err = client.predict(&image, BackendKind::Tensorflow).await.unwrap_err();
        assert!(matches!(err, PredictError::Upload(_)));

        let err = client.predict(&image, BackendKind::Yolov8).await.unwrap_err();
        assert!(matches!(err, PredictError::NoEndpoint(BackendKind::Yolov8)));
    }
}
