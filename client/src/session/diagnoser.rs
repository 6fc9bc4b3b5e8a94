use shared::{BackendKind, ErrorKind, NavigationRequest, PredictionResult, PreprocessSpec, Session};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::acquisition::{AcquireError, AcquireOutcome, ImageSource, PhotoPicker};
use crate::normalize::normalize;
use crate::predict::Predictor;
use crate::preprocess::Preprocessor;
use crate::session::store::{Completion, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum DiagnoseError {
    #[error("No image selected for {0}")]
    NoImageSelected(BackendKind),
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquireError),
    #[error("Prediction failed: {0:?}")]
    Prediction(ErrorKind),
}

impl DiagnoseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DiagnoseError::NoImageSelected(_) => "Please select an image first.",
            DiagnoseError::Acquisition(e) => e.user_message(),
            DiagnoseError::Prediction(kind) => kind.user_message(),
        }
    }
}

/// Runs acquisition and prediction against the per-backend sessions.
///
/// The backend a call works on is read once when the call starts, so
/// switching tabs while it is suspended never redirects its outcome.
pub struct Diagnoser<P, R> {
    picker: P,
    preprocessor: Preprocessor,
    predictor: R,
    specs: HashMap<BackendKind, PreprocessSpec>,
    store: RefCell<SessionStore>,
}

impl<P: PhotoPicker, R: Predictor> Diagnoser<P, R> {
    pub fn new(picker: P, preprocessor: Preprocessor, predictor: R) -> Self {
        let specs = BackendKind::all()
            .into_iter()
            .map(|backend| (backend, backend.default_preprocess()))
            .collect();
        Self {
            picker,
            preprocessor,
            predictor,
            specs,
            store: RefCell::new(SessionStore::new()),
        }
    }

    pub fn with_specs(mut self, specs: HashMap<BackendKind, PreprocessSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    pub fn spec(&self, backend: BackendKind) -> PreprocessSpec {
        self.specs
            .get(&backend)
            .copied()
            .unwrap_or_else(|| backend.default_preprocess())
    }

    pub fn active(&self) -> BackendKind {
        self.store.borrow().active()
    }

    pub fn select(&self, backend: BackendKind) {
        self.store.borrow_mut().select(backend);
    }

    pub fn active_session(&self) -> Session {
        self.store.borrow().active_session()
    }

    pub fn session(&self, backend: BackendKind) -> Session {
        self.store.borrow().session(backend)
    }

    pub async fn acquire(&self, source: ImageSource) -> Result<AcquireOutcome, DiagnoseError> {
        let backend = self.active();
        let outcome = self.picker.pick(source).await.map_err(|e| {
            log::error!("Acquisition from {:?} failed: {}", source, e);
            e
        })?;
        if let AcquireOutcome::Acquired(asset) = &outcome {
            log::info!("New {} image: {}", backend, asset.uri);
            self.store.borrow_mut().set_image(backend, asset.clone());
        }
        Ok(outcome)
    }

    /// Predicts for the active session's image. Failures are recorded on the
    /// session before being returned; an outcome that arrives after a newer
    /// request or image is reported as `Completion::Stale` and not recorded.
    pub async fn analyze(&self) -> Result<Completion, DiagnoseError> {
        let backend = self.active();
        let (image, ticket) = {
            let mut store = self.store.borrow_mut();
            let image = store
                .session(backend)
                .image
                .ok_or(DiagnoseError::NoImageSelected(backend))?;
            (image, store.begin_predict(backend))
        };
        log::info!("Analyzing {} image (request {})", backend, ticket.seq);

        let outcome: Result<PredictionResult, ErrorKind> = async {
            let prepared = self
                .preprocessor
                .preprocess(&image, &self.spec(backend))
                .await
                .map_err(|e| {
                    log::error!("Preprocessing {} failed: {}", image.uri, e);
                    e.kind()
                })?;
            let raw = self
                .predictor
                .predict(&prepared, backend)
                .await
                .map_err(|e| e.kind())?;
            normalize(&raw, backend).map_err(|e| {
                log::error!("Rejected response: {}", e);
                e.kind()
            })
        }
        .await;

        let mut store = self.store.borrow_mut();
        match outcome {
            Ok(result) => Ok(store.complete_predict(ticket, result)),
            Err(kind) => match store.fail_predict(ticket, kind) {
                Completion::Applied => Err(DiagnoseError::Prediction(kind)),
                other => Ok(other),
            },
        }
    }

    /// Detail screen request for one diagnosis of the displayed session.
    pub fn disease_details(&self, index: usize) -> Option<NavigationRequest> {
        let session = self.active_session();
        let payload = session.result?.details(index)?;
        Some(NavigationRequest::detail(payload))
    }
}
