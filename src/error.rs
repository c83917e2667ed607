use serde::Serialize;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Camera unavailable: {0}")]
    DeviceAccess(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Classification service error: {0}")]
    Service(String),
    #[error("Classification service rejected the API key: {0}")]
    Auth(String),
    #[error("Malformed classification response: {0}")]
    Schema(String),
    #[error("Classification service returned no usable candidate")]
    EmptyResponse,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("An analysis is already in progress")]
    AnalysisInProgress,
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable discriminant of [`AppError`], kept by the workflow's error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DeviceAccess,
    Decode,
    Service,
    Auth,
    Schema,
    EmptyResponse,
    Config,
    AnalysisInProgress,
    InvalidTransition,
    Io,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::DeviceAccess(_) => ErrorKind::DeviceAccess,
            AppError::Decode(_) => ErrorKind::Decode,
            AppError::Service(_) => ErrorKind::Service,
            AppError::Auth(_) => ErrorKind::Auth,
            AppError::Schema(_) => ErrorKind::Schema,
            AppError::EmptyResponse => ErrorKind::EmptyResponse,
            AppError::Config(_) => ErrorKind::Config,
            AppError::AnalysisInProgress => ErrorKind::AnalysisInProgress,
            AppError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            AppError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(error: image::ImageError) -> Self {
        AppError::Decode(error.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AppError::Service(format!("request timed out: {}", error))
        } else {
            AppError::Service(error.to_string())
        }
    }
}
