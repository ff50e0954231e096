use crate::{
    error::ReceiptReadError,
    model::ReceiptDraft,
    ports::{FieldExtractor, ReceiptImage, ReceiptOcr},
};

/// The photo-to-draft pipeline: recognize the receipt text, then extract
/// candidate fields from it. Both stages live behind ports; this type only
/// wires them together.
pub struct ReceiptReader<'a> {
    ocr: &'a dyn ReceiptOcr,
    extractor: &'a dyn FieldExtractor,
}

impl<'a> ReceiptReader<'a> {
    pub fn new(ocr: &'a dyn ReceiptOcr, extractor: &'a dyn FieldExtractor) -> Self {
        Self { ocr, extractor }
    }

    pub fn read(&self, image: &ReceiptImage<'_>) -> Result<ReceiptDraft, ReceiptReadError> {
        let recognized = self.ocr.extract_text(image)?;
        tracing::debug!(
            chars = recognized.text.len(),
            mean_confidence = ?recognized.mean_confidence,
            "receipt text recognized"
        );
        let draft = self.extractor.extract(&recognized.text)?;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{FieldExtractionError, ReceiptOcrError},
        model::CandidateField,
        ports::OcrText,
    };

    struct FixedOcr(&'static str);

    impl ReceiptOcr for FixedOcr {
        fn extract_text(&self, _image: &ReceiptImage<'_>) -> Result<OcrText, ReceiptOcrError> {
            Ok(OcrText {
                text: self.0.to_owned(),
                mean_confidence: Some(0.9),
            })
        }
    }

    struct EchoExtractor;

    impl FieldExtractor for EchoExtractor {
        fn extract(&self, receipt_text: &str) -> Result<ReceiptDraft, FieldExtractionError> {
            Ok(ReceiptDraft {
                merchant: CandidateField::extracted(receipt_text.to_owned()),
                ..ReceiptDraft::default()
            })
        }
    }

    struct FailingExtractor;

    impl FieldExtractor for FailingExtractor {
        fn extract(&self, _receipt_text: &str) -> Result<ReceiptDraft, FieldExtractionError> {
            Err(FieldExtractionError::MissingPrompt(
                "extract_merchant".to_owned(),
            ))
        }
    }

    fn image() -> ReceiptImage<'static> {
        ReceiptImage {
            bytes: &[],
            filename: Some("receipt.jpg"),
            content_type: Some("image/jpeg"),
        }
    }

    #[test]
    fn recognized_text_flows_into_the_extractor() {
        let ocr = FixedOcr("CAFE NINE\nTOTAL 23.50");
        let reader = ReceiptReader::new(&ocr, &EchoExtractor);

        let draft = reader.read(&image()).expect("read failed");
        assert_eq!(
            draft.merchant.value.as_deref(),
            Some("CAFE NINE\nTOTAL 23.50")
        );
    }

    #[test]
    fn extractor_failures_surface_as_read_errors() {
        let ocr = FixedOcr("anything");
        let reader = ReceiptReader::new(&ocr, &FailingExtractor);

        let err = reader.read(&image()).expect_err("expected failure");
        assert!(matches!(err, ReceiptReadError::Extraction(_)));
    }
}
