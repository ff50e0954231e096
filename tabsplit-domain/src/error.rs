use std::fmt;

use thiserror::Error;

use crate::model::{Currency, ItemId, Money, ParticipantId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid ISO 4217 alphabetic currency code")]
pub struct InvalidCurrency(pub String);

/// Two operands carried different currency codes. Fatal to the request;
/// never coerced.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("currency mismatch: expected {expected}, found {found}")]
pub struct CurrencyMismatch {
    pub expected: Currency,
    pub found: Currency,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReceiptBuildError {
    #[error(transparent)]
    CurrencyMismatch(#[from] CurrencyMismatch),
    #[error("tax, tip and total must not be negative")]
    NegativeCharge,
    #[error("item {item} has a negative amount")]
    NegativeItemAmount { item: ItemId },
    #[error("item {item} has zero quantity")]
    ZeroQuantity { item: ItemId },
    #[error("item id {item} appears more than once")]
    DuplicateItemId { item: ItemId },
}

/// Why a single item's assignment is unusable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentDefect {
    /// The item has no assignment at all.
    Unassigned,
    /// The assignment names no participants.
    NoParticipants,
    /// The same participant appears twice in one split.
    DuplicateParticipant(ParticipantId),
    /// A weighted split carries a zero weight.
    ZeroWeight(ParticipantId),
    /// The split references a participant outside the roster.
    UnknownParticipant(ParticipantId),
    /// The assignment references an item the receipt does not contain.
    UnknownItem,
}

impl fmt::Display for AssignmentDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => f.write_str("not assigned to anyone"),
            Self::NoParticipants => f.write_str("assigned to an empty participant set"),
            Self::DuplicateParticipant(id) => {
                write!(f, "participant {id} listed more than once")
            }
            Self::ZeroWeight(id) => write!(f, "participant {id} has zero weight"),
            Self::UnknownParticipant(id) => write!(f, "unknown participant {id}"),
            Self::UnknownItem => f.write_str("no such item on the receipt"),
        }
    }
}

/// One or more items cannot be allocated as assigned. A hard precondition
/// failure: the caller must complete the assignment before allocation runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("items with unusable assignments:{}", format_defects(.defects))]
pub struct IncompleteAssignment {
    pub defects: Vec<(ItemId, AssignmentDefect)>,
}

fn format_defects(defects: &[(ItemId, AssignmentDefect)]) -> String {
    defects
        .iter()
        .map(|(item, defect)| format!(" [item {item}: {defect}]"))
        .collect()
}

/// Shares were rounded or repaired outside the representable minor-unit
/// range. Practically unreachable for real receipts.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("monetary amount out of range for minor-unit arithmetic")]
pub struct AmountOutOfRange;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error(transparent)]
    CurrencyMismatch(#[from] CurrencyMismatch),
    #[error(transparent)]
    IncompleteAssignment(#[from] IncompleteAssignment),
    #[error("receipt has no items to allocate")]
    EmptyReceipt,
    #[error("participant id {0} appears more than once in the roster")]
    DuplicateParticipant(ParticipantId),
    /// Internal invariant violation; indicates a bug, never swallowed.
    #[error("internal invariant violation: negative {field} for participant {participant}")]
    NegativeShare {
        participant: ParticipantId,
        field: &'static str,
    },
    #[error(transparent)]
    OutOfRange(#[from] AmountOutOfRange),
    #[error(transparent)]
    Cashback(#[from] CashbackError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CashbackError {
    #[error(transparent)]
    CurrencyMismatch(#[from] CurrencyMismatch),
    #[error("cashback payer {0} is not part of the settlement")]
    UnknownPayer(ParticipantId),
    #[error("cashback must not be negative (got {0})")]
    NegativeCashback(Money),
    #[error("cashback {cashback} exceeds the pre-cashback bill {bill}")]
    ExceedsBill { cashback: Money, bill: Money },
    #[error("internal invariant violation: negative total for participant {participant}")]
    NegativeShare { participant: ParticipantId },
    #[error(transparent)]
    OutOfRange(#[from] AmountOutOfRange),
}

/// Non-fatal report attached to a successful allocation when the stated
/// total and the itemized sum disagree beyond the configured tolerance.
/// The caller decides which side to trust; the engine has already
/// reconciled against the configured authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptImbalance {
    /// The receipt's stated total.
    pub stated: Money,
    /// `sum(items) + tax + tip`.
    pub itemized: Money,
    /// `stated - itemized`.
    pub difference: Money,
}
