//! Field extraction against a locally hosted Ollama model.
//!
//! One chat request per receipt field, each with `temperature: 0` and a JSON
//! schema response format, driven by per-field prompt templates. The
//! templates instruct the model to answer `null`/`0` when a field cannot be
//! determined; those answers come back as `FieldConfidence::Missing`, and
//! answers that cannot be shaped into the field's type as `Uncertain`. No
//! uncertainty ever leaks past the draft.

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tabsplit_application::{
    CandidateField, DraftAmount, DraftItem, FieldExtractionError, FieldExtractor, ReceiptDraft,
};

const DEFAULT_PROMPTS: &str = include_str!("../prompts.yaml");
const SUBSTITUTION_MARKER: &str = "[[ receipt_string ]]";

pub struct OllamaFieldExtractor {
    client: Client,
    base_url: String,
    model: String,
    prompts: HashMap<String, String>,
}

impl OllamaFieldExtractor {
    /// Uses the bundled prompt templates.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, FieldExtractionError> {
        Self::with_prompts(base_url, model, DEFAULT_PROMPTS)
    }

    /// Uses caller-provided YAML prompt templates, one per field.
    pub fn with_prompts(
        base_url: impl Into<String>,
        model: impl Into<String>,
        prompts_yaml: &str,
    ) -> Result<Self, FieldExtractionError> {
        let prompts: HashMap<String, String> = serde_yaml::from_str(prompts_yaml)
            .map_err(|err| FieldExtractionError::PromptFile { source: err.into() })?;

        Ok(Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            prompts,
        })
    }

    fn substituted_prompt(
        &self,
        name: &str,
        receipt_text: &str,
    ) -> Result<String, FieldExtractionError> {
        let template = self
            .prompts
            .get(name)
            .ok_or_else(|| FieldExtractionError::MissingPrompt(name.to_owned()))?;
        Ok(template.replace(SUBSTITUTION_MARKER, receipt_text))
    }

    fn chat(
        &self,
        prompt: String,
        format: Value,
        field: &'static str,
    ) -> Result<Value, FieldExtractionError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            message: ChatMessage,
        }
        #[derive(Deserialize)]
        struct ChatMessage {
            content: String,
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "system", "content": prompt}],
                "format": format,
                "stream": false,
                "options": {"temperature": 0},
            }))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| FieldExtractionError::Backend { source: err.into() })?;

        let body: ChatResponse = response
            .json()
            .map_err(|err| FieldExtractionError::Backend { source: err.into() })?;

        serde_json::from_str(&body.message.content).map_err(|err| {
            FieldExtractionError::MalformedResponse {
                field,
                source: err.into(),
            }
        })
    }

    fn amount_field(
        &self,
        receipt_text: &str,
        prompt_name: &str,
        field: &'static str,
    ) -> Result<CandidateField<DraftAmount>, FieldExtractionError> {
        let response = self.chat(
            self.substituted_prompt(prompt_name, receipt_text)?,
            amount_schema(),
            field,
        )?;
        Ok(amount_from_response(&response))
    }
}

impl FieldExtractor for OllamaFieldExtractor {
    fn extract(&self, receipt_text: &str) -> Result<ReceiptDraft, FieldExtractionError> {
        let merchant = self.chat(
            self.substituted_prompt("extract_merchant", receipt_text)?,
            merchant_schema(),
            "merchant",
        )?;
        let date = self.chat(
            self.substituted_prompt("extract_receipt_date", receipt_text)?,
            date_schema(),
            "date",
        )?;
        let total = self.amount_field(receipt_text, "extract_receipt_total", "total")?;
        let tax = self.amount_field(receipt_text, "extract_receipt_tax", "tax")?;
        let tip = self.amount_field(receipt_text, "extract_receipt_tip", "tip")?;
        let items = self.chat(
            self.substituted_prompt("extract_receipt_items", receipt_text)?,
            items_schema(),
            "items",
        )?;

        Ok(ReceiptDraft {
            merchant: merchant_from_response(&merchant),
            date: date_from_response(&date),
            total,
            tax,
            tip,
            items: items_from_response(&items),
        })
    }
}

fn merchant_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"name": {"type": ["string", "null"]}},
        "required": ["name"],
    })
}

fn date_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"date": {"type": ["string", "null"]}},
        "required": ["date"],
    })
}

fn amount_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "currency": {"type": "string"},
            "amount": {"type": "number"},
        },
        "required": ["currency", "amount"],
    })
}

fn items_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ItemizedReceipt": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "currency": {"type": "string"},
                        "amount": {"type": "number"},
                    },
                    "required": ["name", "currency", "amount"],
                },
            },
        },
        "required": ["ItemizedReceipt"],
    })
}

fn merchant_from_response(response: &Value) -> CandidateField<String> {
    match response.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => CandidateField::extracted(name.to_owned()),
        Some(_) => CandidateField::missing(),
        None if response.get("name").is_some_and(Value::is_null) => CandidateField::missing(),
        None => CandidateField::unresolved(),
    }
}

fn date_from_response(response: &Value) -> CandidateField<NaiveDate> {
    match response.get("date") {
        Some(Value::String(raw)) => match raw.parse::<NaiveDate>() {
            Ok(date) => CandidateField::extracted(date),
            Err(_) => CandidateField::unresolved(),
        },
        Some(Value::Null) => CandidateField::missing(),
        _ => CandidateField::unresolved(),
    }
}

fn amount_from_response(response: &Value) -> CandidateField<DraftAmount> {
    #[derive(Deserialize)]
    struct WireAmount {
        currency: Option<String>,
        amount: Option<Decimal>,
    }

    let Ok(wire) = serde_json::from_value::<WireAmount>(response.clone()) else {
        return CandidateField::unresolved();
    };
    match wire {
        WireAmount {
            amount: Some(amount),
            currency: Some(currency),
        } if !amount.is_zero() => CandidateField::extracted(DraftAmount { currency, amount }),
        WireAmount {
            amount: Some(amount),
            currency: None,
        } if !amount.is_zero() => CandidateField::unresolved(),
        // The prompts fix 0 as the cannot-determine sentinel.
        _ => CandidateField::missing(),
    }
}

fn items_from_response(response: &Value) -> CandidateField<Vec<DraftItem>> {
    #[derive(Deserialize)]
    struct WireItem {
        name: String,
        currency: String,
        amount: Decimal,
    }
    #[derive(Deserialize)]
    struct WireItems {
        #[serde(rename = "ItemizedReceipt")]
        itemized_receipt: Vec<WireItem>,
    }

    let Ok(wire) = serde_json::from_value::<WireItems>(response.clone()) else {
        return CandidateField::unresolved();
    };
    if wire.itemized_receipt.is_empty() {
        return CandidateField::missing();
    }

    let items = wire
        .itemized_receipt
        .into_iter()
        .map(|item| DraftItem {
            name: item.name,
            amount: DraftAmount {
                currency: item.currency,
                amount: item.amount,
            },
            quantity: 1,
        })
        .collect();
    CandidateField::extracted(items)
}
