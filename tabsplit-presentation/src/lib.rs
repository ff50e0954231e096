#![warn(clippy::uninlined_format_args)]

pub mod error_presenter;
pub mod settlement_presenter;
pub mod text_table;

pub use error_presenter::{
    describe_allocation_error, describe_cashback_error, describe_imbalance, describe_verify_error,
};
pub use settlement_presenter::SettlementPresenter;
pub use text_table::{Alignment, TextTableBuilder};
