use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tabsplit_application::{OcrText, ReceiptImage, ReceiptOcr, ReceiptOcrError};

/// Filesystem locations of the rten detection and recognition models.
pub struct OcrModelPaths<'a> {
    pub detection: &'a str,
    pub recognition: &'a str,
}

/// Receipt OCR backed by the ocrs engine.
pub struct OcrsReceiptOcr {
    engine: OcrEngine,
}

impl std::fmt::Debug for OcrsReceiptOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrsReceiptOcr").finish_non_exhaustive()
    }
}

impl OcrsReceiptOcr {
    pub fn new(models: &OcrModelPaths<'_>) -> Result<Self, ReceiptOcrError> {
        let detection_model =
            Model::load_file(models.detection).map_err(|err| ReceiptOcrError::ModelLoad {
                path: models.detection.to_owned(),
                source: err.into(),
            })?;
        let recognition_model =
            Model::load_file(models.recognition).map_err(|err| ReceiptOcrError::ModelLoad {
                path: models.recognition.to_owned(),
                source: err.into(),
            })?;

        let params = OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..OcrEngineParams::default()
        };
        let engine = OcrEngine::new(params).map_err(|err| ReceiptOcrError::EngineInit {
            source: err.into(),
        })?;

        Ok(Self { engine })
    }
}

impl ReceiptOcr for OcrsReceiptOcr {
    fn extract_text(&self, image: &ReceiptImage<'_>) -> Result<OcrText, ReceiptOcrError> {
        let decoded =
            image::load_from_memory(image.bytes).map_err(|err| ReceiptOcrError::ImageDecode {
                source: err.into(),
            })?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ReceiptOcrError::ImageDecode {
                source: err.into(),
            }
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| ReceiptOcrError::OcrRun {
                source: err.into(),
            })?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| ReceiptOcrError::OcrRun {
                source: err.into(),
            })?;

        tracing::debug!(
            filename = ?image.filename,
            width,
            height,
            chars = text.len(),
            "receipt text recognized"
        );

        Ok(OcrText {
            text,
            mean_confidence: None,
        })
    }
}
