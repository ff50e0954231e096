use std::collections::HashMap;

use tabsplit_domain::{Money, Participant, ParticipantId, SettlementBreakdown};

use crate::text_table::{Alignment, TextTableBuilder};

/// Renders a settlement breakdown as a fixed-width table, one row per
/// participant plus a totals row.
pub struct SettlementPresenter;

impl SettlementPresenter {
    pub fn render(breakdown: &SettlementBreakdown, participants: &[Participant]) -> String {
        let names: HashMap<ParticipantId, &str> = participants
            .iter()
            .map(|participant| (participant.id, participant.name.as_str()))
            .collect();

        let mut builder = TextTableBuilder::new()
            .alignments(&[
                Alignment::Left,
                Alignment::Right,
                Alignment::Right,
                Alignment::Right,
                Alignment::Right,
                Alignment::Right,
            ])
            .headers(["Participant", "Items", "Tax", "Tip", "Cashback", "Total"]);

        let mut items_sum = Money::zero(breakdown.currency());
        let mut tax_sum = items_sum;
        let mut tip_sum = items_sum;
        let mut cashback_sum = items_sum;
        let mut owed_sum = items_sum;

        for (id, share) in breakdown.iter() {
            builder = builder.row([
                participant_label(id, &names),
                format_amount(share.items_subtotal),
                format_amount(share.tax_share),
                format_amount(share.tip_share),
                format_amount(share.cashback_adjustment),
                format_amount(share.total_owed),
            ]);
            items_sum = saturating_sum(items_sum, share.items_subtotal);
            tax_sum = saturating_sum(tax_sum, share.tax_share);
            tip_sum = saturating_sum(tip_sum, share.tip_share);
            cashback_sum = saturating_sum(cashback_sum, share.cashback_adjustment);
            owed_sum = saturating_sum(owed_sum, share.total_owed);
        }

        builder = builder.row([
            format!("Total ({})", breakdown.currency()),
            format_amount(items_sum),
            format_amount(tax_sum),
            format_amount(tip_sum),
            format_amount(cashback_sum),
            format_amount(owed_sum),
        ]);

        builder.build()
    }
}

fn participant_label(id: ParticipantId, names: &HashMap<ParticipantId, &str>) -> String {
    match names.get(&id) {
        Some(name) => (*name).to_owned(),
        None => format!("#{id}"),
    }
}

fn format_amount(money: Money) -> String {
    let precision = money.currency().minor_units() as usize;
    format!("{:.precision$}", money.amount())
}

// Breakdown fields always share the breakdown currency; a mismatch here
// would be a bug upstream, so the sum just keeps the running value.
fn saturating_sum(acc: Money, value: Money) -> Money {
    acc.checked_add(value).unwrap_or(acc)
}
