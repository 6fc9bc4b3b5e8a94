use shared::{BackendKind, PredictionResult, Session, SessionStatus};
use std::fmt;

fn percent(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

fn write_result(f: &mut fmt::Formatter<'_>, result: &PredictionResult) -> fmt::Result {
    match result {
        PredictionResult::Tensorflow(c) => {
            writeln!(f, "  Condition: {}", c.label)?;
            writeln!(f, "  Confidence: {}", percent(c.confidence))?;
        }
        PredictionResult::Yolov8(d) if d.items.is_empty() => {
            writeln!(f, "  No disease regions detected")?;
        }
        PredictionResult::Yolov8(d) => {
            for (index, item) in d.items.iter().enumerate() {
                let [a, b, c, e] = item.bounding_box.0;
                writeln!(
                    f,
                    "  [{}] Condition: {} | Confidence: {} | Box: [{:.1}, {:.1}, {:.1}, {:.1}]",
                    index,
                    item.label,
                    percent(item.confidence),
                    a,
                    b,
                    c,
                    e
                )?;
            }
        }
    }

    let recommendations = result.recommendations();
    if !recommendations.is_empty() {
        writeln!(f, "  Care Recommendations")?;
        for rec in recommendations {
            writeln!(f, "    - {}", rec)?;
        }
    }
    Ok(())
}

/// Plain-text view of one session, used by the command line front end.
pub struct SessionReport<'a> {
    pub backend: BackendKind,
    pub session: &'a Session,
}

impl fmt::Display for SessionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session;
        writeln!(f, "{} [{}]", self.backend, session.status)?;
        match &session.image {
            Some(image) => writeln!(f, "  Image: {}", image.uri)?,
            None => writeln!(f, "  No image selected")?,
        }

        match (session.status, &session.result, session.error_kind) {
            (SessionStatus::Success, Some(result), _) => write_result(f, result),
            (SessionStatus::Error, _, Some(kind)) => writeln!(f, "  {}", kind.user_message()),
            (SessionStatus::Loading, _, _) => writeln!(f, "  Analyzing image..."),
            _ => Ok(()),
        }
    }
}

pub fn render_session(backend: BackendKind, session: &Session) -> String {
    SessionReport { backend, session }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        BoundingBox, ClassificationResult, Detection, DetectionResult, ErrorKind, ImageAsset,
    };

    #[test]
    fn classification_report() {
        let session = Session {
            image: Some(ImageAsset::new("file:///leaf.jpg", "image/jpeg")),
            result: Some(PredictionResult::Tensorflow(ClassificationResult {
                label: "Healthy".into(),
                confidence: 0.97,
                disease_info: None,
                recommendations: Some(vec!["Keep watering weekly".into()]),
            })),
            status: SessionStatus::Success,
            error_kind: None,
        };
        let text = render_session(BackendKind::Tensorflow, &session);
        assert!(text.starts_with("tensorflow [Success]"));
        assert!(text.contains("Condition: Healthy"));
        assert!(text.contains("Confidence: 97.00%"));
        assert!(text.contains("Care Recommendations"));
        assert!(text.contains("- Keep watering weekly"));
    }

    #[test]
    fn detection_report_lists_every_item() {
        let item = |label: &str| Detection {
            label: label.into(),
            confidence: 0.5,
            bounding_box: BoundingBox([1.0, 2.0, 3.0, 4.0]),
            area: 4.0,
            class_id: None,
            disease_info: None,
        };
        let session = Session {
            image: None,
            result: Some(PredictionResult::Yolov8(DetectionResult {
                items: vec![item("Rust"), item("Blight")],
                recommendations: None,
            })),
            status: SessionStatus::Success,
            error_kind: None,
        };
        let text = render_session(BackendKind::Yolov8, &session);
        assert!(text.contains("[0] Condition: Rust"));
        assert!(text.contains("[1] Condition: Blight"));
        assert!(!text.contains("Care Recommendations"));
    }

    #[test]
    fn error_report_uses_user_message() {
        let session = Session {
            image: None,
            result: None,
            status: SessionStatus::Error,
            error_kind: Some(ErrorKind::PayloadTooLarge),
        };
        let text = render_session(BackendKind::Tensorflow, &session);
        assert!(text.contains("Image too large, choose a smaller photo."));
    }

    #[test]
    fn report_writes_through_any_formatter() {
        let session = Session {
            image: Some(ImageAsset::new("file:///leaf.jpg", "image/jpeg")),
            result: None,
            status: SessionStatus::Loading,
            error_kind: None,
        };
        let report = SessionReport {
            backend: BackendKind::Yolov8,
            session: &session,
        };
        let text = format!("{}", report);
        assert_eq!(text, render_session(BackendKind::Yolov8, &session));
        assert!(text.starts_with("yolov8 [Loading]\n  Image: file:///leaf.jpg\n"));
        assert!(text.ends_with("  Analyzing image...\n"));
    }
}
