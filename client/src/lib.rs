pub mod acquisition;
pub mod config;
pub mod normalize;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod session;

pub use acquisition::{AcquireOutcome, FilePicker, ImageSource, PhotoPicker};
pub use config::AppConfig;
pub use normalize::normalize;
pub use predict::{PredictionClient, Predictor, RawResponse};
pub use preprocess::Preprocessor;
pub use session::{Completion, DiagnoseError, Diagnoser, SessionStore};
