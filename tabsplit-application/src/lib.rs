#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod model;
pub mod ports;
pub mod reader;
pub mod receipt;

pub use error::{
    FieldExtractionError, ReceiptOcrError, ReceiptReadError, ReceiptVerifyError,
};
pub use model::{CandidateField, DraftAmount, DraftItem, FieldConfidence, ReceiptDraft};
pub use ports::{FieldExtractor, OcrText, ReceiptImage, ReceiptOcr};
pub use reader::ReceiptReader;
pub use receipt::verify;
