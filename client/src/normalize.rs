use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, de};
use serde_json::{Map, Value};
use shared::{
    BackendKind, BoundingBox, ClassificationResult, Detection, DetectionResult, ErrorKind,
    PredictionResult,
};
use std::collections::BTreeMap;

use crate::predict::RawResponse;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Unexpected {backend} payload: {source}")]
    Decode {
        backend: BackendKind,
        source: serde_json::Error,
    },
    #[error("Confidence {value} in `{field}` is outside [0, 1]")]
    ConfidenceOutOfRange { field: String, value: f64 },
}

impl NormalizeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedResponse
    }
}

// Scalars are kept as text, nulls dropped; nested values are rejected.
fn deserialize_disease_info<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(entries) = Option::<Map<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let mut info = BTreeMap::new();
    for (key, value) in entries {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(de::Error::custom(format!("disease_info.{} should be a scalar", key)));
            }
        };
        info.insert(key, text);
    }
    Ok(Some(info))
}

#[derive(Debug, Deserialize)]
struct TfResponse {
    predictions: TfPrediction,
    recommendations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TfPrediction {
    #[serde(rename = "className")]
    class_name: String,
    confidence: f64,
    recommendations: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_disease_info")]
    disease_info: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct YoloResponse {
    predictions: Vec<YoloDetection>,
    recommendations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct YoloDetection {
    #[serde(rename = "className")]
    class_name: String,
    confidence: f64,
    area: f64,
    #[serde(rename = "box")]
    bounding_box: [f64; 4],
    #[serde(rename = "class")]
    class_id: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_disease_info")]
    disease_info: Option<BTreeMap<String, String>>,
}

fn decode<T: DeserializeOwned>(raw: &RawResponse, backend: BackendKind) -> Result<T, NormalizeError> {
    serde_json::from_value(raw.body.clone())
        .map_err(|source| NormalizeError::Decode { backend, source })
}

fn check_confidence(value: f64, field: impl Into<String>) -> Result<f64, NormalizeError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(NormalizeError::ConfidenceOutOfRange {
            field: field.into(),
            value,
        });
    }
    Ok(value)
}

fn classification(raw: &RawResponse) -> Result<ClassificationResult, NormalizeError> {
    let TfResponse {
        predictions,
        recommendations,
    } = decode(raw, BackendKind::Tensorflow)?;

    Ok(ClassificationResult {
        label: predictions.class_name,
        confidence: check_confidence(predictions.confidence, "predictions.confidence")?,
        disease_info: predictions.disease_info,
        recommendations: predictions.recommendations.or(recommendations),
    })
}

fn detections(raw: &RawResponse) -> Result<DetectionResult, NormalizeError> {
    let YoloResponse {
        predictions,
        recommendations,
    } = decode(raw, BackendKind::Yolov8)?;

    let items = predictions
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(Detection {
                label: item.class_name,
                confidence: check_confidence(
                    item.confidence,
                    format!("predictions[{}].confidence", index),
                )?,
                bounding_box: BoundingBox(item.bounding_box),
                area: item.area,
                class_id: item.class_id,
                disease_info: item.disease_info,
            })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    Ok(DetectionResult {
        items,
        recommendations,
    })
}

/// Maps a backend payload to the shared result type. The shape expected is
/// decided by `backend`, never by inspecting the payload.
pub fn normalize(raw: &RawResponse, backend: BackendKind) -> Result<PredictionResult, NormalizeError> {
    let result = match backend {
        BackendKind::Tensorflow => PredictionResult::Tensorflow(classification(raw)?),
        BackendKind::Yolov8 => PredictionResult::Yolov8(detections(raw)?),
    };
    Ok(result)
}
