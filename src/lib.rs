pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod intake;
pub mod pipeline;

pub use config::Settings;
pub use error::{AppError, ErrorKind};

pub use intake::{CameraDevice, FacingMode, SelectedFile, StillFrameCamera};
pub use pipeline::{
    ClassificationResult, ClassificationService, DisplayConfig, GeminiClassifier, WasteCategory,
    Workflow,
};
