use std::path::PathBuf;

use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum PipetteError {
    #[error("failed to load template from {path}: {reason}")]
    TemplateLoad { path: PathBuf, reason: String },

    #[error("invalid template: {0}")]
    TemplateInvalid(String),

    #[error("unknown preset '{name}'. Available: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("field index {index} is out of range (template has {len} fields)")]
    FieldIndex { index: usize, len: usize },

    #[error("no field named '{0}' in this report")]
    UnknownField(String),

    #[error("invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("invoice error: {0}")]
    Invoice(String),

    #[error("template '{0}' is not part of this invoice")]
    InvoiceLineNotFound(String),

    #[error("insufficient stock for '{item}': requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("inventory error: {0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
