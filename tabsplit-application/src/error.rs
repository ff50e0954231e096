use thiserror::Error;

use tabsplit_domain::{InvalidCurrency, ReceiptBuildError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ReceiptOcrError {
    #[error("failed to load OCR model from '{path}'")]
    ModelLoad {
        path: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to initialize the OCR engine")]
    EngineInit {
        #[source]
        source: BoxError,
    },
    #[error("failed to decode the receipt image")]
    ImageDecode {
        #[source]
        source: BoxError,
    },
    #[error("text recognition failed")]
    OcrRun {
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum FieldExtractionError {
    #[error("extraction backend request failed")]
    Backend {
        #[source]
        source: BoxError,
    },
    #[error("extraction backend returned a malformed response for field '{field}'")]
    MalformedResponse {
        field: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("no prompt template named '{0}'")]
    MissingPrompt(String),
    #[error("prompt template file is not valid")]
    PromptFile {
        #[source]
        source: BoxError,
    },
}

/// Rejection of a draft at the verification boundary. The engine never sees
/// a receipt that failed any of these checks.
#[derive(Debug, Error)]
pub enum ReceiptVerifyError {
    #[error("required field '{0}' is missing or unresolved")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidCurrency(#[from] InvalidCurrency),
    #[error(transparent)]
    Build(#[from] ReceiptBuildError),
}

#[derive(Debug, Error)]
pub enum ReceiptReadError {
    #[error(transparent)]
    Ocr(#[from] ReceiptOcrError),
    #[error(transparent)]
    Extraction(#[from] FieldExtractionError),
}
