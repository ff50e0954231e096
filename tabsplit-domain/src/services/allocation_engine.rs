//! The allocation engine: a verified receipt, an item-to-participant
//! assignment and a split configuration go in; a per-participant settlement
//! breakdown comes out.
//!
//! The computation is pure and synchronous. Inputs are read-only snapshots;
//! every call constructs a fresh breakdown, so concurrent calls for
//! different receipts need no coordination.

use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::{
    error::{
        AllocationError, AssignmentDefect, CurrencyMismatch, IncompleteAssignment,
        ReceiptImbalance,
    },
    model::{
        ItemAssignments, ItemId, ItemSplit, Money, Participant, ParticipantId, ParticipantShare,
        Receipt, SettlementBreakdown, SharePolicy, SplitConfig, TotalAuthority,
    },
    services::{
        cashback_distributor::distribute,
        share_rounding::{RawShare, reconcile},
    },
};

/// A successful allocation. `imbalance` is present when the receipt's stated
/// total and its itemized sum disagree beyond the configured tolerance; the
/// breakdown is still reconciled against the configured authority.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    pub breakdown: SettlementBreakdown,
    pub imbalance: Option<ReceiptImbalance>,
}

/// Computes every participant's owed amount for one receipt.
///
/// Fails fast on structural problems (unassigned items, duplicate roster
/// entries, mixed currencies); succeeds with an attached [`ReceiptImbalance`]
/// when only the soft `items + tax + tip ≈ total` invariant is violated.
pub fn allocate(
    receipt: &Receipt,
    participants: &[Participant],
    assignments: &ItemAssignments,
    config: &SplitConfig,
) -> Result<Allocation, AllocationError> {
    let currency = receipt.currency();

    let mut roster: Vec<ParticipantId> = Vec::with_capacity(participants.len());
    let mut known = FxHashSet::default();
    for participant in participants {
        if !known.insert(participant.id) {
            return Err(AllocationError::DuplicateParticipant(participant.id));
        }
        roster.push(participant.id);
    }
    roster.sort_unstable();

    if let Some(cashback) = &config.cashback {
        if cashback.amount.currency() != currency {
            return Err(CurrencyMismatch {
                expected: currency,
                found: cashback.amount.currency(),
            }
            .into());
        }
    }

    validate_assignments(receipt, assignments, &known)?;
    if receipt.items().is_empty() {
        return Err(AllocationError::EmptyReceipt);
    }

    // Full-precision item subtotals; nothing is rounded until reconciliation.
    let mut raw_subtotals: FxHashMap<ParticipantId, Decimal> =
        roster.iter().map(|id| (*id, Decimal::ZERO)).collect();
    for item in receipt.items() {
        let Some(split) = assignments.get(item.id) else {
            continue;
        };
        let amount = item.amount.amount();
        match split {
            ItemSplit::Equal(ids) => {
                let share = amount / Decimal::from(ids.len());
                for id in ids {
                    if let Some(subtotal) = raw_subtotals.get_mut(id) {
                        *subtotal += share;
                    }
                }
            }
            ItemSplit::Weighted(weights) => {
                let weight_sum: u64 = weights.iter().map(|(_, weight)| u64::from(*weight)).sum();
                let denominator = Decimal::from(weight_sum);
                for (id, weight) in weights {
                    if let Some(subtotal) = raw_subtotals.get_mut(id) {
                        *subtotal += amount * Decimal::from(*weight) / denominator;
                    }
                }
            }
        }
    }

    let items_sum: Decimal = raw_subtotals.values().copied().sum();

    // Participants carrying any of the bill. On an all-zero receipt every
    // assigned participant stays in, so equal policies keep a denominator.
    let mut active: Vec<ParticipantId> = roster
        .iter()
        .copied()
        .filter(|id| raw_subtotals[id] > Decimal::ZERO)
        .collect();
    if active.is_empty() {
        let assigned: FxHashSet<ParticipantId> = assignments
            .iter()
            .flat_map(|(_, split)| split.participants())
            .collect();
        active = roster
            .iter()
            .copied()
            .filter(|id| assigned.contains(id))
            .collect();
    }
    let consumer_count = Decimal::from(active.len());

    let proportions: Vec<Decimal> = active
        .iter()
        .map(|id| {
            if items_sum.is_zero() {
                Decimal::ONE / consumer_count
            } else {
                raw_subtotals[id] / items_sum
            }
        })
        .collect();

    let raw_items: Vec<RawShare> = active
        .iter()
        .map(|id| RawShare::new(*id, raw_subtotals[id]))
        .collect();
    let raw_tax = charge_column(
        receipt.tax().amount(),
        config.tax_policy,
        &active,
        &proportions,
        consumer_count,
    );
    let raw_tip = charge_column(
        receipt.tip().amount(),
        config.tip_policy,
        &active,
        &proportions,
        consumer_count,
    );

    // Each column is conserved against its own stated charge, so tax and tip
    // always sum exactly to the receipt's figures.
    let items_col = reconcile(receipt.items_total(), &raw_items)?;
    let tax_col = reconcile(receipt.tax(), &raw_tax)?;
    let tip_col = reconcile(receipt.tip(), &raw_tip)?;

    let stated = receipt.total();
    let itemized = receipt
        .items_total()
        .checked_add(receipt.tax())?
        .checked_add(receipt.tip())?;
    let authoritative = match config.total_authority {
        TotalAuthority::Stated => stated,
        TotalAuthority::Itemized => itemized,
    };

    // Grand totals are rescaled to the authoritative figure before
    // reconciliation. For a consistent receipt the factor is one and this is
    // plain largest-remainder rounding; for an inconsistent one the gap is
    // spread proportionally instead of driving small shares negative.
    let raw_totals: Vec<Decimal> = raw_items
        .iter()
        .zip(&raw_tax)
        .zip(&raw_tip)
        .map(|((items, tax), tip)| items.amount + tax.amount + tip.amount)
        .collect();
    let raw_totals_sum: Decimal = raw_totals.iter().copied().sum();
    let scaled_totals: Vec<RawShare> = active
        .iter()
        .zip(&raw_totals)
        .map(|(id, raw_total)| {
            let amount = if raw_totals_sum.is_zero() {
                authoritative.amount() / consumer_count
            } else {
                *raw_total * authoritative.amount() / raw_totals_sum
            };
            RawShare::new(*id, amount)
        })
        .collect();
    let totals_col = reconcile(authoritative, &scaled_totals)?;

    let difference = stated.checked_sub(itemized)?;
    let imbalance = if difference.amount().abs() > config.imbalance_tolerance {
        tracing::warn!(
            stated = %stated,
            itemized = %itemized,
            authority = ?config.total_authority,
            "receipt stated total disagrees with its itemized sum"
        );
        Some(ReceiptImbalance {
            stated,
            itemized,
            difference,
        })
    } else {
        None
    };

    let mut per_participant: IndexMap<ParticipantId, ParticipantShare> = roster
        .iter()
        .map(|id| (*id, ParticipantShare::zero(currency)))
        .collect();
    for (idx, id) in active.iter().enumerate() {
        let share = ParticipantShare {
            items_subtotal: items_col[idx].1,
            tax_share: tax_col[idx].1,
            tip_share: tip_col[idx].1,
            cashback_adjustment: Money::zero(currency),
            total_owed: totals_col[idx].1,
        };
        per_participant.insert(*id, share);
    }

    for (id, share) in &per_participant {
        for (field, money) in [
            ("items_subtotal", share.items_subtotal),
            ("tax_share", share.tax_share),
            ("tip_share", share.tip_share),
            ("total_owed", share.total_owed),
        ] {
            if money.is_negative() {
                tracing::error!(participant = %id, field, amount = %money, "negative final share");
                return Err(AllocationError::NegativeShare {
                    participant: *id,
                    field,
                });
            }
        }
    }

    let breakdown = SettlementBreakdown::new(currency, per_participant);
    let breakdown = match &config.cashback {
        Some(cashback) => distribute(&breakdown, cashback)?,
        None => breakdown,
    };

    Ok(Allocation {
        breakdown,
        imbalance,
    })
}

fn charge_column(
    charge: Decimal,
    policy: SharePolicy,
    active: &[ParticipantId],
    proportions: &[Decimal],
    consumer_count: Decimal,
) -> Vec<RawShare> {
    active
        .iter()
        .zip(proportions)
        .map(|(id, proportion)| {
            let amount = match policy {
                SharePolicy::ProportionalToItems => charge * proportion,
                SharePolicy::EqualSplit => charge / consumer_count,
            };
            RawShare::new(*id, amount)
        })
        .collect()
}

fn validate_assignments(
    receipt: &Receipt,
    assignments: &ItemAssignments,
    known: &FxHashSet<ParticipantId>,
) -> Result<(), AllocationError> {
    let item_ids: FxHashSet<ItemId> = receipt.items().iter().map(|item| item.id).collect();
    let mut defects = Vec::new();

    for (item, _) in assignments.iter() {
        if !item_ids.contains(&item) {
            defects.push((item, AssignmentDefect::UnknownItem));
        }
    }

    for item in receipt.items() {
        match assignments.get(item.id) {
            None => defects.push((item.id, AssignmentDefect::Unassigned)),
            Some(ItemSplit::Equal(ids)) => {
                if ids.is_empty() {
                    defects.push((item.id, AssignmentDefect::NoParticipants));
                }
                let mut seen = FxHashSet::default();
                for id in ids {
                    if !known.contains(id) {
                        defects.push((item.id, AssignmentDefect::UnknownParticipant(*id)));
                    }
                    if !seen.insert(*id) {
                        defects.push((item.id, AssignmentDefect::DuplicateParticipant(*id)));
                    }
                }
            }
            Some(ItemSplit::Weighted(weights)) => {
                if weights.is_empty() {
                    defects.push((item.id, AssignmentDefect::NoParticipants));
                }
                let mut seen = FxHashSet::default();
                for (id, weight) in weights {
                    if *weight == 0 {
                        defects.push((item.id, AssignmentDefect::ZeroWeight(*id)));
                    }
                    if !known.contains(id) {
                        defects.push((item.id, AssignmentDefect::UnknownParticipant(*id)));
                    }
                    if !seen.insert(*id) {
                        defects.push((item.id, AssignmentDefect::DuplicateParticipant(*id)));
                    }
                }
            }
        }
    }

    if defects.is_empty() {
        Ok(())
    } else {
        tracing::debug!(defect_count = defects.len(), "rejecting incomplete assignment");
        Err(IncompleteAssignment { defects }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Currency, Money, ReceiptItem};
    use rstest::rstest;

    fn usd(amount: &str) -> Money {
        Money::new(amount.parse().expect("valid decimal"), Currency::USD)
    }

    fn participant(id: u64, name: &str) -> Participant {
        Participant {
            id: ParticipantId(id),
            name: name.to_owned(),
        }
    }

    fn item(id: u32, name: &str, amount: &str) -> ReceiptItem {
        ReceiptItem {
            id: ItemId(id),
            name: name.to_owned(),
            amount: usd(amount),
            quantity: 1,
        }
    }

    fn receipt(items: Vec<ReceiptItem>, tax: &str, tip: &str, total: &str) -> Receipt {
        Receipt::try_new(
            Some("Test Diner".to_owned()),
            None,
            items,
            usd(tax),
            usd(tip),
            usd(total),
        )
        .expect("valid receipt")
    }

    fn owed(allocation: &Allocation, id: u64) -> Money {
        allocation
            .breakdown
            .get(ParticipantId(id))
            .expect("participant present")
            .total_owed
    }

    #[test]
    fn weighted_split_follows_relative_shares() {
        let receipt = receipt(vec![item(0, "Pitcher", "30.00")], "0", "0", "30.00");
        let participants = [participant(1, "Alice"), participant(2, "Bob")];
        let assignments = ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Weighted(vec![(ParticipantId(1), 2), (ParticipantId(2), 1)]),
        )]);

        let allocation = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect("allocation failed");

        assert_eq!(owed(&allocation, 1), usd("20.00"));
        assert_eq!(owed(&allocation, 2), usd("10.00"));
        assert!(allocation.imbalance.is_none());
    }

    #[test]
    fn equal_split_policies_divide_over_consumers_only() {
        // Carol ordered nothing: an equal tax split is over two heads.
        let receipt = receipt(
            vec![item(0, "Pasta", "10.00"), item(1, "Pizza", "10.00")],
            "6.00",
            "0",
            "26.00",
        );
        let participants = [
            participant(1, "Alice"),
            participant(2, "Bob"),
            participant(3, "Carol"),
        ];
        let assignments = ItemAssignments::from_iter([
            (ItemId(0), ItemSplit::Equal(vec![ParticipantId(1)])),
            (ItemId(1), ItemSplit::Equal(vec![ParticipantId(2)])),
        ]);
        let config = SplitConfig {
            tax_policy: SharePolicy::EqualSplit,
            ..SplitConfig::default()
        };

        let allocation =
            allocate(&receipt, &participants, &assignments, &config).expect("allocation failed");

        let alice = allocation
            .breakdown
            .get(ParticipantId(1))
            .expect("present");
        let carol = allocation
            .breakdown
            .get(ParticipantId(3))
            .expect("present");
        assert_eq!(alice.tax_share, usd("3.00"));
        assert_eq!(carol.tax_share, usd("0.00"));
        assert_eq!(carol.total_owed, usd("0.00"));
    }

    #[test]
    fn tax_and_tip_policies_apply_independently() {
        let receipt = receipt(
            vec![item(0, "Steak", "30.00"), item(1, "Salad", "10.00")],
            "4.00",
            "8.00",
            "52.00",
        );
        let participants = [participant(1, "Alice"), participant(2, "Bob")];
        let assignments = ItemAssignments::from_iter([
            (ItemId(0), ItemSplit::Equal(vec![ParticipantId(1)])),
            (ItemId(1), ItemSplit::Equal(vec![ParticipantId(2)])),
        ]);
        let config = SplitConfig {
            tax_policy: SharePolicy::ProportionalToItems,
            tip_policy: SharePolicy::EqualSplit,
            ..SplitConfig::default()
        };

        let allocation =
            allocate(&receipt, &participants, &assignments, &config).expect("allocation failed");

        let alice = allocation
            .breakdown
            .get(ParticipantId(1))
            .expect("present");
        let bob = allocation.breakdown.get(ParticipantId(2)).expect("present");
        assert_eq!(alice.tax_share, usd("3.00"));
        assert_eq!(bob.tax_share, usd("1.00"));
        assert_eq!(alice.tip_share, usd("4.00"));
        assert_eq!(bob.tip_share, usd("4.00"));
    }

    #[rstest]
    #[case::unassigned_item(
        ItemAssignments::new(),
        AssignmentDefect::Unassigned
    )]
    #[case::empty_participant_set(
        ItemAssignments::from_iter([(ItemId(0), ItemSplit::Equal(vec![]))]),
        AssignmentDefect::NoParticipants
    )]
    #[case::zero_weight(
        ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Weighted(vec![(ParticipantId(1), 0)]),
        )]),
        AssignmentDefect::ZeroWeight(ParticipantId(1))
    )]
    #[case::duplicate_participant(
        ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Equal(vec![ParticipantId(1), ParticipantId(1)]),
        )]),
        AssignmentDefect::DuplicateParticipant(ParticipantId(1))
    )]
    #[case::unknown_participant(
        ItemAssignments::from_iter([(ItemId(0), ItemSplit::Equal(vec![ParticipantId(9)]))]),
        AssignmentDefect::UnknownParticipant(ParticipantId(9))
    )]
    fn structural_defects_are_rejected(
        #[case] assignments: ItemAssignments,
        #[case] expected: AssignmentDefect,
    ) {
        let receipt = receipt(vec![item(0, "Soup", "5.00")], "0", "0", "5.00");
        let participants = [participant(1, "Alice")];

        let err = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect_err("expected rejection");

        match err {
            AllocationError::IncompleteAssignment(incomplete) => {
                assert!(incomplete.defects.contains(&(ItemId(0), expected)));
            }
            other => panic!("expected IncompleteAssignment, got {other:?}"),
        }
    }

    #[test]
    fn assignment_for_unknown_item_is_rejected() {
        let receipt = receipt(vec![item(0, "Soup", "5.00")], "0", "0", "5.00");
        let participants = [participant(1, "Alice")];
        let mut assignments =
            ItemAssignments::from_iter([(ItemId(0), ItemSplit::Equal(vec![ParticipantId(1)]))]);
        assignments.assign(ItemId(7), ItemSplit::Equal(vec![ParticipantId(1)]));

        let err = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect_err("expected rejection");

        match err {
            AllocationError::IncompleteAssignment(incomplete) => {
                assert!(
                    incomplete
                        .defects
                        .contains(&(ItemId(7), AssignmentDefect::UnknownItem))
                );
            }
            other => panic!("expected IncompleteAssignment, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_roster_entry_is_rejected() {
        let receipt = receipt(vec![item(0, "Soup", "5.00")], "0", "0", "5.00");
        let participants = [participant(1, "Alice"), participant(1, "Alias")];
        let assignments =
            ItemAssignments::from_iter([(ItemId(0), ItemSplit::Equal(vec![ParticipantId(1)]))]);

        let err = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect_err("expected rejection");
        assert_eq!(err, AllocationError::DuplicateParticipant(ParticipantId(1)));
    }

    #[test]
    fn cashback_in_foreign_currency_is_rejected() {
        let receipt = receipt(vec![item(0, "Soup", "5.00")], "0", "0", "5.00");
        let participants = [participant(1, "Alice")];
        let assignments =
            ItemAssignments::from_iter([(ItemId(0), ItemSplit::Equal(vec![ParticipantId(1)]))]);
        let config = SplitConfig {
            cashback: Some(crate::model::Cashback {
                amount: Money::from_minor_units(100, Currency::JPY),
                payer: ParticipantId(1),
            }),
            ..SplitConfig::default()
        };

        let err = allocate(&receipt, &participants, &assignments, &config)
            .expect_err("expected rejection");
        assert_eq!(
            err,
            AllocationError::CurrencyMismatch(CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::JPY,
            })
        );
    }

    #[test]
    fn inconsistent_receipt_reconciles_to_stated_total_with_report() {
        // Items say 20.00 but the stated total is 21.00: the stated figure
        // wins by default and the gap is surfaced, not swallowed.
        let receipt = receipt(vec![item(0, "Mystery", "20.00")], "0", "0", "21.00");
        let participants = [participant(1, "Alice"), participant(2, "Bob")];
        let assignments = ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Equal(vec![ParticipantId(1), ParticipantId(2)]),
        )]);

        let allocation = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect("allocation failed");

        assert_eq!(allocation.breakdown.total_owed(), usd("21.00"));
        let imbalance = allocation.imbalance.expect("imbalance reported");
        assert_eq!(imbalance.difference, usd("1.00"));
    }

    #[test]
    fn itemized_authority_overrides_stated_total() {
        let receipt = receipt(vec![item(0, "Mystery", "20.00")], "0", "0", "21.00");
        let participants = [participant(1, "Alice"), participant(2, "Bob")];
        let assignments = ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Equal(vec![ParticipantId(1), ParticipantId(2)]),
        )]);
        let config = SplitConfig {
            total_authority: TotalAuthority::Itemized,
            ..SplitConfig::default()
        };

        let allocation =
            allocate(&receipt, &participants, &assignments, &config).expect("allocation failed");

        assert_eq!(allocation.breakdown.total_owed(), usd("20.00"));
        assert!(allocation.imbalance.is_some());
    }

    #[test]
    fn zero_amount_receipt_allocates_zeros() {
        let receipt = receipt(vec![item(0, "Water", "0.00")], "0", "0", "0.00");
        let participants = [participant(1, "Alice"), participant(2, "Bob")];
        let assignments = ItemAssignments::from_iter([(
            ItemId(0),
            ItemSplit::Equal(vec![ParticipantId(1), ParticipantId(2)]),
        )]);

        let allocation = allocate(
            &receipt,
            &participants,
            &assignments,
            &SplitConfig::default(),
        )
        .expect("allocation failed");

        assert_eq!(allocation.breakdown.total_owed(), usd("0.00"));
        assert_eq!(owed(&allocation, 1), usd("0.00"));
    }
}
