use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Screen the detail payload is addressed to.
pub const DETAIL_SCREEN: &str = "InfoDisease";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub uri: String,
    pub mime_type: String,
}

impl ImageAsset {
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Tensorflow,
    Yolov8,
}

impl BackendKind {
    pub fn all() -> Vec<BackendKind> {
        BackendKind::iter().collect()
    }

    pub fn default_preprocess(&self) -> PreprocessSpec {
        match self {
            BackendKind::Tensorflow => PreprocessSpec::jpeg(224, 224, 90),
            BackendKind::Yolov8 => PreprocessSpec::jpeg(800, 600, 80),
        }
    }

    pub fn default_path(&self) -> &'static str {
        match self {
            BackendKind::Tensorflow => "/api/tensorflow/predict",
            BackendKind::Yolov8 => "/api/yolov8/predict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum EncodeFormat {
    #[default]
    #[strum(serialize = "JPEG")]
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessSpec {
    pub target_width: u32,
    pub target_height: u32,
    #[serde(default)]
    pub format: EncodeFormat,
    pub quality: u8,
}

impl PreprocessSpec {
    pub fn jpeg(target_width: u32, target_height: u32, quality: u8) -> Self {
        Self {
            target_width,
            target_height,
            format: EncodeFormat::Jpeg,
            quality,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.target_width > 0 && self.target_height > 0 && self.quality <= 100
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
    pub disease_info: Option<BTreeMap<String, String>>,
    pub recommendations: Option<Vec<String>>,
}

/// Raw box coordinates as sent by the detector, either `[x, y, w, h]` or
/// `[x1, y1, x2, y2]` depending on the model export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox(pub [f64; 4]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    pub area: f64,
    pub class_id: Option<u32>,
    pub disease_info: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub items: Vec<Detection>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum PredictionResult {
    Tensorflow(ClassificationResult),
    Yolov8(DetectionResult),
}

impl PredictionResult {
    pub fn backend(&self) -> BackendKind {
        match self {
            PredictionResult::Tensorflow(_) => BackendKind::Tensorflow,
            PredictionResult::Yolov8(_) => BackendKind::Yolov8,
        }
    }

    pub fn recommendations(&self) -> &[String] {
        let recs = match self {
            PredictionResult::Tensorflow(c) => c.recommendations.as_ref(),
            PredictionResult::Yolov8(d) => d.recommendations.as_ref(),
        };
        recs.map(Vec::as_slice).unwrap_or_default()
    }

    /// Payload for the detail screen of one diagnosis. A classification only
    /// has index 0.
    pub fn details(&self, index: usize) -> Option<NavigationPayload> {
        let (label, info) = match self {
            PredictionResult::Tensorflow(c) if index == 0 => (&c.label, &c.disease_info),
            PredictionResult::Tensorflow(_) => return None,
            PredictionResult::Yolov8(d) => {
                let item = d.items.get(index)?;
                (&item.label, &item.disease_info)
            }
        };
        Some(NavigationPayload {
            disease_info: info.clone().unwrap_or_default(),
            disease_name: label.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    EncodingError,
    NetworkError,
    PayloadTooLarge,
    ServerError(u16),
    MalformedResponse,
}

impl ErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::EncodingError => "Could not process this photo, try another one.",
            ErrorKind::NetworkError => "Cannot reach the diagnosis server, check your connection.",
            ErrorKind::PayloadTooLarge => "Image too large, choose a smaller photo.",
            ErrorKind::ServerError(_) => "Server error, try again later.",
            ErrorKind::MalformedResponse => "Unexpected response from the server.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub image: Option<ImageAsset>,
    pub result: Option<PredictionResult>,
    pub status: SessionStatus,
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPayload {
    pub disease_info: BTreeMap<String, String>,
    pub disease_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub screen: String,
    pub payload: NavigationPayload,
}

impl NavigationRequest {
    pub fn detail(payload: NavigationPayload) -> Self {
        Self {
            screen: DETAIL_SCREEN.to_string(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn backend_names_round_trip() {
        assert_eq!(BackendKind::Tensorflow.to_string(), "tensorflow");
        assert_eq!(BackendKind::Yolov8.as_ref(), "yolov8");
        assert_eq!(BackendKind::from_str("yolov8").unwrap(), BackendKind::Yolov8);
        assert!(BackendKind::from_str("resnet").is_err());
        assert_eq!(BackendKind::all().len(), 2);
        assert_eq!(BackendKind::default(), BackendKind::Tensorflow);
    }

    #[test]
    fn every_error_kind_has_its_own_message() {
        let kinds = [
            ErrorKind::EncodingError,
            ErrorKind::NetworkError,
            ErrorKind::PayloadTooLarge,
            ErrorKind::ServerError(500),
            ErrorKind::MalformedResponse,
        ];
        let mut messages: Vec<_> = kinds.iter().map(|k| k.user_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }

    #[test]
    fn details_follow_result_shape() {
        let mut info = BTreeMap::new();
        info.insert("cause".to_string(), "fungus".to_string());
        let classification = PredictionResult::Tensorflow(ClassificationResult {
            label: "Leaf Mold".into(),
            confidence: 0.8,
            disease_info: Some(info.clone()),
            recommendations: None,
        });
        let payload = classification.details(0).unwrap();
        assert_eq!(payload.disease_name, "Leaf Mold");
        assert_eq!(payload.disease_info, info);
        assert!(classification.details(1).is_none());

        let detections = PredictionResult::Yolov8(DetectionResult {
            items: vec![Detection {
                label: "Rust".into(),
                confidence: 0.6,
                bounding_box: BoundingBox([1.0, 2.0, 3.0, 4.0]),
                area: 12.0,
                class_id: Some(3),
                disease_info: None,
            }],
            recommendations: Some(vec!["Remove affected leaves".into()]),
        });
        let payload = detections.details(0).unwrap();
        assert_eq!(payload.disease_name, "Rust");
        assert!(payload.disease_info.is_empty());
        assert!(detections.details(1).is_none());
        assert_eq!(detections.recommendations().len(), 1);
        assert_eq!(detections.backend(), BackendKind::Yolov8);
    }

    #[test]
    fn navigation_payload_uses_camel_case_keys() {
        let request = NavigationRequest::detail(NavigationPayload {
            disease_info: BTreeMap::new(),
            disease_name: "Healthy".into(),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["screen"], "InfoDisease");
        assert_eq!(json["payload"]["diseaseName"], "Healthy");
        assert!(json["payload"]["diseaseInfo"].is_object());
    }
}
