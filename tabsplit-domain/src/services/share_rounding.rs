//! Largest-remainder reconciliation of rounded shares against an exact total.
//!
//! Raw shares carry full decimal precision; the breakdown must be expressed
//! in whole minor units and still sum exactly to the stated charge. This
//! module rounds half-to-even, measures the drift against the target, and
//! repairs it one minor unit at a time.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    error::AmountOutOfRange,
    model::{Money, ParticipantId},
};

/// A participant's share before rounding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawShare {
    pub participant: ParticipantId,
    pub amount: Decimal,
}

impl RawShare {
    pub fn new(participant: ParticipantId, amount: Decimal) -> Self {
        Self { participant, amount }
    }
}

/// Rounds every raw share half-to-even to the minor unit of `target`'s
/// currency, then repairs the drift so the results sum to `target` exactly.
///
/// Repair ranks shares by `rounded - raw`: units are granted to the shares
/// rounded furthest down first and reclaimed from those rounded furthest up
/// first, with exact ties broken by ascending participant id. Drift wider
/// than one unit per share (the authoritative-total case) is folded in as a
/// uniform euclidean base adjustment before the remainder pass, so the
/// result is exact for any drift, not only the rounding band.
pub fn reconcile(
    target: Money,
    raw: &[RawShare],
) -> Result<Vec<(ParticipantId, Money)>, AmountOutOfRange> {
    let currency = target.currency();
    let scale = currency.minor_units();

    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let target_units = target
        .round_to_minor_unit()
        .to_minor_units()
        .ok_or(AmountOutOfRange)?;

    let mut entries: Vec<(ParticipantId, i64, Decimal)> = Vec::with_capacity(raw.len());
    let mut rounded_sum: i64 = 0;
    for share in raw {
        let rounded = share
            .amount
            .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
        let units = Money::new(rounded, currency)
            .to_minor_units()
            .ok_or(AmountOutOfRange)?;
        rounded_sum = rounded_sum.checked_add(units).ok_or(AmountOutOfRange)?;
        // diff > 0 means the share gained from rounding.
        let diff = rounded - share.amount;
        entries.push((share.participant, units, diff));
    }

    let drift = target_units.checked_sub(rounded_sum).ok_or(AmountOutOfRange)?;
    if drift != 0 {
        let count = entries.len() as i64;
        let base = drift.div_euclid(count);
        let extra = drift.rem_euclid(count) as usize;

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            entries[a]
                .2
                .cmp(&entries[b].2)
                .then_with(|| entries[a].0.cmp(&entries[b].0))
        });

        tracing::debug!(
            drift,
            base,
            extra,
            share_count = entries.len(),
            target_units,
            "repairing rounding drift"
        );

        for (rank, idx) in order.into_iter().enumerate() {
            let mut adjustment = base;
            if rank < extra {
                adjustment += 1;
            }
            entries[idx].1 = entries[idx].1.checked_add(adjustment).ok_or(AmountOutOfRange)?;
        }
    }

    let repaired: i64 = entries.iter().map(|(_, units, _)| units).sum();
    if repaired != target_units {
        tracing::error!(
            repaired,
            target_units,
            "reconciled shares failed to restore the exact target"
        );
        return Err(AmountOutOfRange);
    }

    Ok(entries
        .into_iter()
        .map(|(participant, units, _)| (participant, Money::from_minor_units(units, currency)))
        .collect())
}
