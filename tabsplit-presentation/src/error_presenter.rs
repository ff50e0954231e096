use tabsplit_application::ReceiptVerifyError;
use tabsplit_domain::{AllocationError, CashbackError, ReceiptImbalance};

/// User-facing message for an allocation failure.
pub fn describe_allocation_error(error: &AllocationError) -> String {
    match error {
        AllocationError::CurrencyMismatch(mismatch) => format!(
            "Amounts in {} and {} cannot be combined. Check the receipt's currencies.",
            mismatch.expected, mismatch.found
        ),
        AllocationError::IncompleteAssignment(incomplete) => {
            let items: Vec<String> = incomplete
                .defects
                .iter()
                .map(|(item, defect)| format!("item {item} ({defect})"))
                .collect();
            format!(
                "Assign every item to at least one person before splitting: {}.",
                items.join(", ")
            )
        }
        AllocationError::EmptyReceipt => {
            "The receipt has no items. Add at least one line item.".to_owned()
        }
        AllocationError::DuplicateParticipant(id) => {
            format!("Participant {id} appears twice in the group.")
        }
        AllocationError::NegativeShare { participant, field } => format!(
            "Internal error: computed a negative {field} for participant {participant}. \
             This is a bug, please report it."
        ),
        AllocationError::OutOfRange(_) => {
            "The receipt's amounts are too large to settle exactly.".to_owned()
        }
        AllocationError::Cashback(cashback) => describe_cashback_error(cashback),
    }
}

/// User-facing message for a cashback distribution failure.
pub fn describe_cashback_error(error: &CashbackError) -> String {
    match error {
        CashbackError::CurrencyMismatch(mismatch) => format!(
            "The cashback is in {} but the bill is in {}.",
            mismatch.found, mismatch.expected
        ),
        CashbackError::UnknownPayer(id) => {
            format!("The cashback payer (participant {id}) is not part of this split.")
        }
        CashbackError::NegativeCashback(amount) => {
            format!("The cashback amount ({amount}) cannot be negative.")
        }
        CashbackError::ExceedsBill { cashback, bill } => {
            format!("The cashback ({cashback}) is larger than the bill ({bill}).")
        }
        CashbackError::NegativeShare { participant } => format!(
            "Internal error: cashback drove participant {participant}'s total negative. \
             This is a bug, please report it."
        ),
        CashbackError::OutOfRange(_) => {
            "The cashback amounts are too large to settle exactly.".to_owned()
        }
    }
}

/// User-facing message for a draft that failed verification.
pub fn describe_verify_error(error: &ReceiptVerifyError) -> String {
    match error {
        ReceiptVerifyError::MissingField(field) => {
            format!("The receipt's {field} is missing. Fill it in before splitting.")
        }
        ReceiptVerifyError::InvalidCurrency(invalid) => {
            format!("{invalid}. Use a three-letter code such as USD.")
        }
        ReceiptVerifyError::Build(build) => format!("The receipt is not valid: {build}."),
    }
}

/// Informational banner for a receipt whose stated total disagrees with its
/// itemized sum. Shown alongside the breakdown, never instead of it.
pub fn describe_imbalance(imbalance: &ReceiptImbalance) -> String {
    format!(
        "Heads up: the receipt's stated total ({}) differs from its itemized sum ({}) by {}. \
         The split uses the configured authoritative total; double-check the extracted amounts.",
        imbalance.stated, imbalance.itemized, imbalance.difference
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tabsplit_domain::{
        AssignmentDefect, Currency, CurrencyMismatch, IncompleteAssignment, ItemId, Money,
        ParticipantId,
    };

    #[rstest]
    #[case::currency(
        AllocationError::CurrencyMismatch(CurrencyMismatch {
            expected: Currency::USD,
            found: Currency::EUR,
        }),
        "USD"
    )]
    #[case::empty_receipt(AllocationError::EmptyReceipt, "no items")]
    #[case::duplicate(
        AllocationError::DuplicateParticipant(ParticipantId(3)),
        "Participant 3"
    )]
    fn allocation_messages_name_the_problem(
        #[case] error: AllocationError,
        #[case] needle: &str,
    ) {
        assert!(describe_allocation_error(&error).contains(needle));
    }

    #[test]
    fn incomplete_assignment_message_lists_items() {
        let error = AllocationError::IncompleteAssignment(IncompleteAssignment {
            defects: vec![
                (ItemId(0), AssignmentDefect::Unassigned),
                (ItemId(3), AssignmentDefect::NoParticipants),
            ],
        });
        let message = describe_allocation_error(&error);
        assert!(message.contains("item 0"));
        assert!(message.contains("item 3"));
    }

    #[test]
    fn imbalance_banner_shows_both_totals() {
        let usd = |amount: i64| Money::from_minor_units(amount, Currency::USD);
        let message = describe_imbalance(&ReceiptImbalance {
            stated: usd(10000),
            itemized: usd(9900),
            difference: usd(100),
        });
        assert!(message.contains("100.00 USD"));
        assert!(message.contains("99.00 USD"));
        assert!(message.contains("1.00 USD"));
    }
}
