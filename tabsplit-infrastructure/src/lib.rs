#![warn(clippy::uninlined_format_args)]

pub mod extractor;
pub mod ocr;

pub use extractor::OllamaFieldExtractor;
pub use ocr::{OcrModelPaths, OcrsReceiptOcr};
