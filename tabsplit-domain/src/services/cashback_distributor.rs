//! Redistribution of a card reward across the settlement.
//!
//! The payer puts the whole bill on their card and earns the reward; fairness
//! says the benefit belongs to everyone in proportion to what they owe. The
//! adjustment column is reconciled with the same largest-remainder rule as
//! the main breakdown, so adjustments sum to the cashback amount exactly.

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::{
    error::{CashbackError, CurrencyMismatch},
    model::{Cashback, ParticipantId, ParticipantShare, SettlementBreakdown},
    services::share_rounding::{RawShare, reconcile},
};

/// Applies `cashback` to a pre-cashback breakdown.
///
/// Each participant's `cashback_adjustment` becomes their proportional slice
/// of the reward (weighted by pre-cashback `total_owed`) and their
/// `total_owed` is reduced by it, so the adjusted totals sum to
/// `bill - cashback`. The who-pays-whom ledger against the payer is the
/// caller's concern.
pub fn distribute(
    breakdown: &SettlementBreakdown,
    cashback: &Cashback,
) -> Result<SettlementBreakdown, CashbackError> {
    let currency = breakdown.currency();
    if cashback.amount.currency() != currency {
        return Err(CurrencyMismatch {
            expected: currency,
            found: cashback.amount.currency(),
        }
        .into());
    }
    if cashback.amount.is_negative() {
        return Err(CashbackError::NegativeCashback(cashback.amount));
    }
    if breakdown.get(cashback.payer).is_none() {
        return Err(CashbackError::UnknownPayer(cashback.payer));
    }

    let bill = breakdown.total_owed();
    if cashback.amount.amount() > bill.amount() {
        return Err(CashbackError::ExceedsBill {
            cashback: cashback.amount,
            bill,
        });
    }

    let raw: Vec<RawShare> = breakdown
        .iter()
        .map(|(id, share)| {
            let amount = if bill.is_zero() {
                Decimal::ZERO
            } else {
                cashback.amount.amount() * share.total_owed.amount() / bill.amount()
            };
            RawShare::new(id, amount)
        })
        .collect();
    let adjustments = reconcile(cashback.amount, &raw)?;

    tracing::debug!(
        cashback = %cashback.amount,
        payer = %cashback.payer,
        participant_count = breakdown.len(),
        "redistributing cashback"
    );

    let mut per_participant: IndexMap<ParticipantId, ParticipantShare> =
        IndexMap::with_capacity(breakdown.len());
    for ((id, share), (_, adjustment)) in breakdown.iter().zip(adjustments) {
        let total_owed = share
            .total_owed
            .checked_sub(adjustment)
            .map_err(CashbackError::from)?;
        if total_owed.is_negative() {
            tracing::error!(participant = %id, amount = %total_owed, "negative adjusted total");
            return Err(CashbackError::NegativeShare { participant: id });
        }
        per_participant.insert(
            id,
            ParticipantShare {
                cashback_adjustment: adjustment,
                total_owed,
                ..*share
            },
        );
    }

    Ok(SettlementBreakdown::new(currency, per_participant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Currency, ItemAssignments, ItemId, ItemSplit, Money, Participant, Receipt, ReceiptItem,
        SplitConfig,
    };
    use crate::services::allocation_engine::allocate;
    use rstest::rstest;

    fn usd(amount: &str) -> Money {
        Money::new(amount.parse().expect("valid decimal"), Currency::USD)
    }

    fn seventy_thirty_breakdown() -> SettlementBreakdown {
        let receipt = Receipt::try_new(
            None,
            None,
            vec![ReceiptItem {
                id: ItemId(0),
                name: "Feast".to_owned(),
                amount: usd("100.00"),
                quantity: 1,
            }],
            usd("0"),
            usd("0"),
            usd("100.00"),
        )
        .expect("valid receipt");
        let participants = [
            Participant {
                id: ParticipantId(1),
                name: "Alice".to_owned(),
            },
            Participant {
                id: ParticipantId(2),
                name: "Bob".to_owned(),
            },
        ];
        let assignments = ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Weighted(vec![(ParticipantId(1), 7), (ParticipantId(2), 3)]),
        )]);

        allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect("allocation failed")
        .breakdown
    }

    #[test]
    fn cashback_is_shared_proportionally_to_owed_totals() {
        let breakdown = seventy_thirty_breakdown();
        let cashback = Cashback {
            amount: usd("5.00"),
            payer: ParticipantId(1),
        };

        let adjusted = distribute(&breakdown, &cashback).expect("distribution failed");

        let alice = adjusted.get(ParticipantId(1)).expect("present");
        let bob = adjusted.get(ParticipantId(2)).expect("present");
        assert_eq!(alice.cashback_adjustment, usd("3.50"));
        assert_eq!(bob.cashback_adjustment, usd("1.50"));
        assert_eq!(alice.total_owed, usd("66.50"));
        assert_eq!(bob.total_owed, usd("28.50"));
        assert_eq!(adjusted.total_owed(), usd("95.00"));
    }

    #[test]
    fn adjustments_sum_exactly_on_odd_amounts() {
        let breakdown = seventy_thirty_breakdown();
        let cashback = Cashback {
            amount: usd("0.05"),
            payer: ParticipantId(2),
        };

        let adjusted = distribute(&breakdown, &cashback).expect("distribution failed");

        let total_adjustment = adjusted
            .iter()
            .fold(Decimal::ZERO, |acc, (_, share)| {
                acc + share.cashback_adjustment.amount()
            });
        assert_eq!(total_adjustment, cashback.amount.amount());
    }

    #[rstest]
    #[case::unknown_payer(usd("1.00"), 9, CashbackError::UnknownPayer(ParticipantId(9)))]
    #[case::negative_amount(usd("-1.00"), 1, CashbackError::NegativeCashback(usd("-1.00")))]
    #[case::exceeds_bill(
        usd("200.00"),
        1,
        CashbackError::ExceedsBill { cashback: usd("200.00"), bill: usd("100.00") }
    )]
    fn invalid_cashback_is_rejected(
        #[case] amount: Money,
        #[case] payer: u64,
        #[case] expected: CashbackError,
    ) {
        let breakdown = seventy_thirty_breakdown();
        let cashback = Cashback {
            amount,
            payer: ParticipantId(payer),
        };

        let err = distribute(&breakdown, &cashback).expect_err("expected rejection");
        assert_eq!(err, expected);
    }

    #[test]
    fn mixed_currency_cashback_is_rejected() {
        let breakdown = seventy_thirty_breakdown();
        let cashback = Cashback {
            amount: Money::from_minor_units(500, Currency::JPY),
            payer: ParticipantId(1),
        };

        let err = distribute(&breakdown, &cashback).expect_err("expected rejection");
        assert_eq!(
            err,
            CashbackError::CurrencyMismatch(CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::JPY,
            })
        );
    }

    #[test]
    fn full_cashback_zeroes_the_bill() {
        let breakdown = seventy_thirty_breakdown();
        let cashback = Cashback {
            amount: usd("100.00"),
            payer: ParticipantId(1),
        };

        let adjusted = distribute(&breakdown, &cashback).expect("distribution failed");
        assert!(adjusted.total_owed().is_zero());
    }
}
