use crate::{
    error::{FieldExtractionError, ReceiptOcrError},
    model::ReceiptDraft,
};

/// A receipt photograph as handed to the OCR stage.
pub struct ReceiptImage<'a> {
    pub bytes: &'a [u8],
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

/// Raw recognized text plus an aggregate confidence when the engine
/// provides one.
pub struct OcrText {
    pub text: String,
    pub mean_confidence: Option<f32>,
}

/// Optical character recognition over a receipt photograph.
pub trait ReceiptOcr: Send + Sync {
    fn extract_text(&self, image: &ReceiptImage<'_>) -> Result<OcrText, ReceiptOcrError>;
}

/// Structured field extraction from recognized receipt text.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, receipt_text: &str) -> Result<ReceiptDraft, FieldExtractionError>;
}
