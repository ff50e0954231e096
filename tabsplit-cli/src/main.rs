//! Splits a receipt from a JSON session file and prints the breakdown.
//!
//! The session carries the human-corrected receipt draft, the group of
//! participants, the item assignments and the split configuration — the same
//! data the correction UI would hand to the engine.

use std::{borrow::Cow, env, fs, process};

use rust_decimal::Decimal;
use serde::Deserialize;
use tabsplit_application::{ReceiptDraft, verify};
use tabsplit_domain::{
    Cashback, Currency, ItemAssignments, ItemId, ItemSplit, Money, Participant, ParticipantId,
    SharePolicy, SplitConfig, TotalAuthority, allocate,
};
use tabsplit_presentation::{
    SettlementPresenter, describe_allocation_error, describe_imbalance, describe_verify_error,
};

type CliResult<T> = Result<T, Cow<'static, str>>;

#[derive(Deserialize)]
struct Session {
    participants: Vec<SessionParticipant>,
    receipt: ReceiptDraft,
    assignments: Vec<SessionAssignment>,
    #[serde(default)]
    config: SessionConfig,
}

#[derive(Deserialize)]
struct SessionParticipant {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct SessionAssignment {
    item: u32,
    #[serde(flatten)]
    split: SessionSplit,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionSplit {
    Equal(Vec<u64>),
    Weighted(Vec<(u64, u32)>),
}

#[derive(Default, Deserialize)]
struct SessionConfig {
    #[serde(default)]
    tax_policy: SessionPolicy,
    #[serde(default)]
    tip_policy: SessionPolicy,
    #[serde(default)]
    total_authority: SessionAuthority,
    #[serde(default)]
    cashback: Option<SessionCashback>,
    #[serde(default)]
    imbalance_tolerance: Option<Decimal>,
}

#[derive(Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionPolicy {
    #[default]
    ProportionalToItems,
    EqualSplit,
}

#[derive(Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionAuthority {
    #[default]
    Stated,
    Itemized,
}

#[derive(Deserialize)]
struct SessionCashback {
    currency: String,
    amount: Decimal,
    payer: u64,
}

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let Some(path) = env::args().nth(1) else {
        return Err("Usage: tabsplit <session.json>".into());
    };

    let source =
        fs::read_to_string(&path).map_err(|err| format!("Failed to read '{path}': {err}"))?;
    let session: Session =
        serde_json::from_str(&source).map_err(|err| format!("Invalid session file: {err}"))?;

    let receipt = verify(&session.receipt).map_err(|err| describe_verify_error(&err))?;

    let participants: Vec<Participant> = session
        .participants
        .into_iter()
        .map(|participant| Participant {
            id: ParticipantId(participant.id),
            name: participant.name,
        })
        .collect();

    let assignments: ItemAssignments = session
        .assignments
        .into_iter()
        .map(|assignment| {
            let split = match assignment.split {
                SessionSplit::Equal(ids) => {
                    ItemSplit::Equal(ids.into_iter().map(ParticipantId).collect())
                }
                SessionSplit::Weighted(weights) => ItemSplit::Weighted(
                    weights
                        .into_iter()
                        .map(|(id, weight)| (ParticipantId(id), weight))
                        .collect(),
                ),
            };
            (ItemId(assignment.item), split)
        })
        .collect();

    let config = split_config(session.config, receipt.currency())?;

    let allocation = allocate(&receipt, &participants, &assignments, &config)
        .map_err(|err| describe_allocation_error(&err))?;

    if let Some(imbalance) = &allocation.imbalance {
        eprintln!("{}", describe_imbalance(imbalance));
    }
    print!(
        "{}",
        SettlementPresenter::render(&allocation.breakdown, &participants)
    );

    Ok(())
}

fn split_config(session: SessionConfig, receipt_currency: Currency) -> CliResult<SplitConfig> {
    let cashback = session
        .cashback
        .map(|cashback| {
            let currency = Currency::from_code(&cashback.currency)
                .map_err(|err| format!("Invalid cashback currency: {err}"))?;
            if currency != receipt_currency {
                return Err(format!(
                    "Cashback currency {currency} does not match the receipt's {receipt_currency}"
                ));
            }
            Ok(Cashback {
                amount: Money::new(cashback.amount, currency),
                payer: ParticipantId(cashback.payer),
            })
        })
        .transpose()?;

    let defaults = SplitConfig::default();
    Ok(SplitConfig {
        tax_policy: share_policy(session.tax_policy),
        tip_policy: share_policy(session.tip_policy),
        cashback,
        total_authority: match session.total_authority {
            SessionAuthority::Stated => TotalAuthority::Stated,
            SessionAuthority::Itemized => TotalAuthority::Itemized,
        },
        imbalance_tolerance: session
            .imbalance_tolerance
            .unwrap_or(defaults.imbalance_tolerance),
    })
}

fn share_policy(policy: SessionPolicy) -> SharePolicy {
    match policy {
        SessionPolicy::ProportionalToItems => SharePolicy::ProportionalToItems,
        SessionPolicy::EqualSplit => SharePolicy::EqualSplit,
    }
}
