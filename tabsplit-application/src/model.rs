use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How much trust the extraction stage places in a candidate value.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConfidence {
    /// The model produced a well-formed answer.
    Extracted,
    /// The model answered, but the answer needs human review.
    Uncertain,
    /// The model reported the field as undeterminable.
    #[default]
    Missing,
}

/// One extracted field: an optional value plus the extractor's confidence.
/// The correction UI edits these before verification.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateField<T> {
    pub value: Option<T>,
    pub confidence: FieldConfidence,
}

impl<T> CandidateField<T> {
    pub fn extracted(value: T) -> Self {
        Self {
            value: Some(value),
            confidence: FieldConfidence::Extracted,
        }
    }

    pub fn uncertain(value: T) -> Self {
        Self {
            value: Some(value),
            confidence: FieldConfidence::Uncertain,
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: FieldConfidence::Missing,
        }
    }

    /// No usable value, but not a clean "missing" either — the extractor
    /// answered with something it could not shape into the field's type.
    pub fn unresolved() -> Self {
        Self {
            value: None,
            confidence: FieldConfidence::Uncertain,
        }
    }
}

impl<T> Default for CandidateField<T> {
    fn default() -> Self {
        Self::missing()
    }
}

/// A monetary amount as extracted: currency still a plain string, validated
/// only at verification time.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DraftAmount {
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DraftItem {
    pub name: String,
    pub amount: DraftAmount,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// The untrusted output of the extraction stage. Every field is a candidate
/// until a human confirms it and `verify` turns the draft into a
/// domain `Receipt`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ReceiptDraft {
    #[serde(default)]
    pub merchant: CandidateField<String>,
    #[serde(default)]
    pub date: CandidateField<NaiveDate>,
    #[serde(default)]
    pub total: CandidateField<DraftAmount>,
    #[serde(default)]
    pub tax: CandidateField<DraftAmount>,
    #[serde(default)]
    pub tip: CandidateField<DraftAmount>,
    #[serde(default)]
    pub items: CandidateField<Vec<DraftItem>>,
}
