use tabsplit_domain::{Currency, ItemId, Money, Receipt, ReceiptItem};

use crate::{
    error::ReceiptVerifyError,
    model::{CandidateField, DraftAmount, ReceiptDraft},
};

/// Turns a human-corrected draft into the immutable domain `Receipt`.
///
/// The total and the item list are required; tax and tip default to zero in
/// the total's currency, since plenty of receipts carry neither. Currency
/// codes, sign constraints and single-currency consistency are all checked
/// here or in `Receipt::try_new` — the allocation engine never sees a
/// malformed receipt.
pub fn verify(draft: &ReceiptDraft) -> Result<Receipt, ReceiptVerifyError> {
    let total = required_amount(&draft.total, "total")?;
    let currency = total.currency();
    let tax = optional_amount(&draft.tax, currency)?;
    let tip = optional_amount(&draft.tip, currency)?;

    let draft_items = draft
        .items
        .value
        .as_deref()
        .filter(|items| !items.is_empty())
        .ok_or(ReceiptVerifyError::MissingField("items"))?;

    let items = draft_items
        .iter()
        .enumerate()
        .map(|(idx, draft_item)| {
            let currency = Currency::from_code(&draft_item.amount.currency)?;
            Ok(ReceiptItem {
                id: ItemId(idx as u32),
                name: draft_item.name.clone(),
                amount: Money::new(draft_item.amount.amount, currency),
                quantity: draft_item.quantity,
            })
        })
        .collect::<Result<Vec<_>, ReceiptVerifyError>>()?;

    let receipt = Receipt::try_new(
        draft.merchant.value.clone(),
        draft.date.value,
        items,
        tax,
        tip,
        total,
    )?;
    Ok(receipt)
}

fn required_amount(
    field: &CandidateField<DraftAmount>,
    name: &'static str,
) -> Result<Money, ReceiptVerifyError> {
    let amount = field
        .value
        .as_ref()
        .ok_or(ReceiptVerifyError::MissingField(name))?;
    to_money(amount)
}

fn optional_amount(
    field: &CandidateField<DraftAmount>,
    currency: Currency,
) -> Result<Money, ReceiptVerifyError> {
    match &field.value {
        Some(amount) => to_money(amount),
        None => Ok(Money::zero(currency)),
    }
}

fn to_money(amount: &DraftAmount) -> Result<Money, ReceiptVerifyError> {
    let currency = Currency::from_code(&amount.currency)?;
    Ok(Money::new(amount.amount, currency))
}
