use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelUnreachable,
    ImageDecode,
    Classification,
    Config,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AppError {
            kind,
            message: message.into(),
        }
    }

    pub fn model_unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelUnreachable, message)
    }

    pub fn image_decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImageDecode, message)
    }

    pub fn classification(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Classification, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        Self::new(ErrorKind::ImageDecode, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(ErrorKind::ModelUnreachable, err.to_string())
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        Self::new(ErrorKind::Classification, err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Config, err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }
}
