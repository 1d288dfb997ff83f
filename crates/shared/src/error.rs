use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }
}

/// Quantity rules broken by a progress record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("quantity must be a finite number")]
    NotFinite,
    #[error("quantity {value} must not be negative")]
    Negative { value: f64 },
    #[error("wastage fraction {fraction} must be within 0..=1")]
    FractionOutOfRange { fraction: f64 },
    #[error("wastage {wastage} kg exceeds input {input} kg")]
    WastageExceedsInput { wastage: f64, input: f64 },
    #[error("output {output} kg + wastage {wastage} kg does not balance input {input} kg")]
    Unbalanced { input: f64, output: f64, wastage: f64 },
}
