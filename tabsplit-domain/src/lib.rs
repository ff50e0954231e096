#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod model;
pub mod services;

pub use error::{
    AllocationError, AmountOutOfRange, AssignmentDefect, CashbackError, CurrencyMismatch,
    IncompleteAssignment, InvalidCurrency, ReceiptBuildError, ReceiptImbalance,
};
pub use model::{
    Cashback, Currency, ItemAssignments, ItemId, ItemSplit, Money, Participant, ParticipantId,
    ParticipantShare, Receipt, ReceiptItem, SettlementBreakdown, SharePolicy, SplitConfig,
    TotalAuthority,
};
pub use services::{Allocation, allocate, distribute};
