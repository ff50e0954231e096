use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::error::{CurrencyMismatch, InvalidCurrency, ReceiptBuildError};

/// ISO 4217 alphabetic currency code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Self = Self(*b"USD");
    pub const EUR: Self = Self(*b"EUR");
    pub const JPY: Self = Self(*b"JPY");

    pub fn from_code(code: &str) -> Result<Self, InvalidCurrency> {
        match code.as_bytes() {
            [a, b, c] if code.bytes().all(|byte| byte.is_ascii_uppercase()) => {
                Ok(Self([*a, *b, *c]))
            }
            _ => Err(InvalidCurrency(code.to_owned())),
        }
    }

    pub fn code(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Number of fractional digits in the minor unit (e.g. 2 for USD, 0 for JPY).
    pub fn minor_units(self) -> u32 {
        match &self.0 {
            b"BIF" | b"CLP" | b"DJF" | b"GNF" | b"ISK" | b"JPY" | b"KMF" | b"KRW" | b"PYG"
            | b"RWF" | b"UGX" | b"VND" | b"VUV" | b"XAF" | b"XOF" | b"XPF" => 0,
            b"BHD" | b"IQD" | b"JOD" | b"KWD" | b"LYD" | b"OMR" | b"TND" => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

/// A monetary amount tagged with its currency.
///
/// Arithmetic between two values requires identical currencies; mixing them
/// is a `CurrencyMismatch`, never a coercion. Amounts keep full `Decimal`
/// precision until `round_to_minor_unit` is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Builds a value from integer minor units (e.g. cents for USD).
    pub fn from_minor_units(units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(units, currency.minor_units()), currency)
    }

    pub fn amount(self) -> Decimal {
        self.amount
    }

    pub fn currency(self) -> Currency {
        self.currency
    }

    pub fn is_zero(self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, CurrencyMismatch> {
        self.require_same_currency(rhs)?;
        Ok(Self::new(self.amount + rhs.amount, self.currency))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, CurrencyMismatch> {
        self.require_same_currency(rhs)?;
        Ok(Self::new(self.amount - rhs.amount, self.currency))
    }

    /// Multiplies by a proportion at full precision, without rounding.
    pub fn scale(self, proportion: Decimal) -> Self {
        Self::new(self.amount * proportion, self.currency)
    }

    /// Rounds half-to-even to the currency's minor unit.
    pub fn round_to_minor_unit(self) -> Self {
        let rounded = self
            .amount
            .round_dp_with_strategy(self.currency.minor_units(), RoundingStrategy::MidpointNearestEven);
        Self::new(rounded, self.currency)
    }

    /// Converts to integer minor units, or `None` when the amount carries
    /// sub-minor-unit precision or overflows.
    pub fn to_minor_units(self) -> Option<i64> {
        let factor = Decimal::from_i128_with_scale(10_i128.checked_pow(self.currency.minor_units())?, 0);
        let units = self.amount.checked_mul(factor)?;
        if units.fract() != Decimal::ZERO {
            return None;
        }
        units.to_i64()
    }

    fn require_same_currency(self, rhs: Self) -> Result<(), CurrencyMismatch> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(CurrencyMismatch {
                expected: self.currency,
                found: rhs.currency,
            })
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

/// One receipt line. `amount` is the quantity-inclusive line total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptItem {
    pub id: ItemId,
    pub name: String,
    pub amount: Money,
    pub quantity: u32,
}

/// A verified receipt. Immutable once built; every monetary field shares one
/// currency, enforced at construction.
///
/// The `items + tax + tip ≈ total` invariant is deliberately soft — extraction
/// is fallible — and is reconciled by the allocation engine rather than
/// enforced here.
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
    merchant: Option<String>,
    date: Option<NaiveDate>,
    items: Vec<ReceiptItem>,
    tax: Money,
    tip: Money,
    total: Money,
    currency: Currency,
}

impl Receipt {
    pub fn try_new(
        merchant: Option<String>,
        date: Option<NaiveDate>,
        items: Vec<ReceiptItem>,
        tax: Money,
        tip: Money,
        total: Money,
    ) -> Result<Self, ReceiptBuildError> {
        let currency = total.currency();
        for charge in [tax, tip] {
            if charge.currency() != currency {
                return Err(CurrencyMismatch {
                    expected: currency,
                    found: charge.currency(),
                }
                .into());
            }
        }
        if tax.is_negative() || tip.is_negative() || total.is_negative() {
            return Err(ReceiptBuildError::NegativeCharge);
        }

        let mut seen = fxhash::FxHashSet::default();
        for item in &items {
            if item.amount.currency() != currency {
                return Err(CurrencyMismatch {
                    expected: currency,
                    found: item.amount.currency(),
                }
                .into());
            }
            if item.amount.is_negative() {
                return Err(ReceiptBuildError::NegativeItemAmount { item: item.id });
            }
            if item.quantity == 0 {
                return Err(ReceiptBuildError::ZeroQuantity { item: item.id });
            }
            if !seen.insert(item.id) {
                return Err(ReceiptBuildError::DuplicateItemId { item: item.id });
            }
        }

        Ok(Self {
            merchant,
            date,
            items,
            tax,
            tip,
            total,
            currency,
        })
    }

    pub fn merchant(&self) -> Option<&str> {
        self.merchant.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn items(&self) -> &[ReceiptItem] {
        &self.items
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn tip(&self) -> Money {
        self.tip
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Exact sum of the item line totals.
    pub fn items_total(&self) -> Money {
        let sum = self
            .items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.amount.amount());
        Money::new(sum, self.currency)
    }
}

/// How one item's cost is divided among participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemSplit {
    /// Shared equally by the listed participants.
    Equal(Vec<ParticipantId>),
    /// Divided by relative weight; weights are positive and need not sum to
    /// the item quantity.
    Weighted(Vec<(ParticipantId, u32)>),
}

impl ItemSplit {
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        match self {
            Self::Equal(ids) => ItemSplitParticipants::Equal(ids.iter()),
            Self::Weighted(weights) => ItemSplitParticipants::Weighted(weights.iter()),
        }
    }
}

enum ItemSplitParticipants<'a> {
    Equal(std::slice::Iter<'a, ParticipantId>),
    Weighted(std::slice::Iter<'a, (ParticipantId, u32)>),
}

impl Iterator for ItemSplitParticipants<'_> {
    type Item = ParticipantId;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Equal(iter) => iter.next().copied(),
            Self::Weighted(iter) => iter.next().map(|(id, _)| *id),
        }
    }
}

/// Item-to-participant mapping. Every receipt item must be assigned exactly
/// once before allocation; `allocate` rejects anything else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemAssignments {
    splits: IndexMap<ItemId, ItemSplit>,
}

impl ItemAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the split for an item, replacing any previous one.
    pub fn assign(&mut self, item: ItemId, split: ItemSplit) {
        self.splits.insert(item, split);
    }

    pub fn get(&self, item: ItemId) -> Option<&ItemSplit> {
        self.splits.get(&item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &ItemSplit)> {
        self.splits.iter().map(|(id, split)| (*id, split))
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}

impl FromIterator<(ItemId, ItemSplit)> for ItemAssignments {
    fn from_iter<T: IntoIterator<Item = (ItemId, ItemSplit)>>(iter: T) -> Self {
        Self {
            splits: iter.into_iter().collect(),
        }
    }
}

/// How a shared charge (tax or tip) is divided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SharePolicy {
    /// In proportion to each participant's item subtotal.
    #[default]
    ProportionalToItems,
    /// Evenly across participants with any consumption.
    EqualSplit,
}

/// Which total the engine reconciles against when the stated total and the
/// itemized sum disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TotalAuthority {
    /// Trust the receipt's stated total.
    #[default]
    Stated,
    /// Trust `sum(items) + tax + tip`.
    Itemized,
}

/// A card reward earned by the participant who paid the bill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cashback {
    pub amount: Money,
    pub payer: ParticipantId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SplitConfig {
    pub tax_policy: SharePolicy,
    pub tip_policy: SharePolicy,
    pub cashback: Option<Cashback>,
    pub total_authority: TotalAuthority,
    /// Largest tolerated gap between the stated total and the itemized sum
    /// before an imbalance is reported, in currency units.
    pub imbalance_tolerance: Decimal,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            tax_policy: SharePolicy::default(),
            tip_policy: SharePolicy::default(),
            cashback: None,
            total_authority: TotalAuthority::default(),
            imbalance_tolerance: Decimal::new(1, 2),
        }
    }
}

/// One participant's settled amounts. Every field is non-negative in a final
/// breakdown; `cashback_adjustment` is the reduction already applied to
/// `total_owed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticipantShare {
    pub items_subtotal: Money,
    pub tax_share: Money,
    pub tip_share: Money,
    pub cashback_adjustment: Money,
    pub total_owed: Money,
}

impl ParticipantShare {
    pub fn zero(currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            items_subtotal: zero,
            tax_share: zero,
            tip_share: zero,
            cashback_adjustment: zero,
            total_owed: zero,
        }
    }
}

/// The engine's output: per-participant shares, ordered by ascending
/// participant id. A pure value — recomputed on every configuration change,
/// never mutated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementBreakdown {
    currency: Currency,
    per_participant: IndexMap<ParticipantId, ParticipantShare>,
}

impl SettlementBreakdown {
    pub(crate) fn new(
        currency: Currency,
        per_participant: IndexMap<ParticipantId, ParticipantShare>,
    ) -> Self {
        Self {
            currency,
            per_participant,
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn get(&self, participant: ParticipantId) -> Option<&ParticipantShare> {
        self.per_participant.get(&participant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, &ParticipantShare)> {
        self.per_participant.iter().map(|(id, share)| (*id, share))
    }

    pub fn len(&self) -> usize {
        self.per_participant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_participant.is_empty()
    }

    /// Exact sum of `total_owed` across participants.
    pub fn total_owed(&self) -> Money {
        let sum = self
            .per_participant
            .values()
            .fold(Decimal::ZERO, |acc, share| acc + share.total_owed.amount());
        Money::new(sum, self.currency)
    }
}
