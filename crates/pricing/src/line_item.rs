use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopdocs_core::{DomainError, DomainResult, Entity, LineItemId, Money};

/// Largest quantity accepted on a single line.
pub const MAX_QUANTITY: i64 = 1_000_000;
/// Largest unit price accepted on a single line, in whole currency units.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;
/// Tax rates are percentages in `[0, 100]`.
pub const MAX_TAX_PERCENT: i64 = 100;
/// Fractional digits accepted on quantities and percentages.
pub const MAX_SCALE: u32 = 4;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemKind {
    Product,
    Service,
}

/// A discount expressed either as a percentage or a flat amount, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage in `[0, 100]`.
    Percent(Decimal),
    /// Flat amount, `>= 0`.
    Amount(Money),
}

impl Discount {
    /// Build from the two mutually exclusive input fields.
    pub fn from_parts(
        percent: Option<Decimal>,
        amount: Option<Money>,
    ) -> DomainResult<Option<Discount>> {
        let discount = match (percent, amount) {
            (Some(_), Some(_)) => {
                return Err(DomainError::validation(
                    "discount_percent and discount_amount are mutually exclusive",
                ));
            }
            (Some(p), None) => Some(Discount::Percent(p)),
            (None, Some(a)) => Some(Discount::Amount(a)),
            (None, None) => None,
        };
        if let Some(d) = &discount {
            d.validate()?;
        }
        Ok(discount)
    }

    /// Resolve a header patch against the `current` document discount.
    ///
    /// `clear` removes the discount and cannot be combined with new values.
    /// With no fields set the current discount is kept.
    pub fn patched(
        current: Option<Discount>,
        percent: Option<Decimal>,
        amount: Option<Money>,
        clear: bool,
    ) -> DomainResult<Option<Discount>> {
        if clear {
            if percent.is_some() || amount.is_some() {
                return Err(DomainError::validation(
                    "clear_discount cannot be combined with discount_percent or discount_amount",
                ));
            }
            return Ok(None);
        }
        if percent.is_none() && amount.is_none() {
            return Ok(current);
        }
        Self::from_parts(percent, amount)
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Discount::Percent(p) => {
                if p.is_sign_negative() || *p > Decimal::ONE_HUNDRED {
                    return Err(DomainError::validation(
                        "discount_percent must be between 0 and 100",
                    ));
                }
                if p.normalize().scale() > MAX_SCALE {
                    return Err(DomainError::validation(format!(
                        "discount_percent accepts at most {MAX_SCALE} fractional digits"
                    )));
                }
            }
            Discount::Amount(a) => {
                if a.is_negative() {
                    return Err(DomainError::validation("discount_amount must not be negative"));
                }
            }
        }
        Ok(())
    }

    /// Exact discount value against `base`. Flat amounts are capped at `base`.
    pub fn value_on(&self, base: Decimal) -> Decimal {
        if base <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self {
            Discount::Percent(p) => base.saturating_mul(*p) / Decimal::ONE_HUNDRED,
            Discount::Amount(a) => a.to_decimal().min(base),
        }
    }
}

/// A priced line on a quotation or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub kind: LineItemKind,
    /// Catalog product or service this line was priced from, if any.
    pub reference_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Option<Discount>,
    pub tax_percent: Decimal,
    pub notes: Option<String>,
}

/// Client-supplied shape for a new line item. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItemInput {
    pub kind: LineItemKind,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default)]
    pub tax_percent: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of a line item. Only these fields can change.
///
/// Setting either discount field replaces the current discount; sending both
/// is a validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItemPatch {
    #[serde(default)]
    pub kind: Option<LineItemKind>,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default)]
    pub tax_percent: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LineItem {
    pub fn new(id: LineItemId, input: LineItemInput) -> DomainResult<Self> {
        let item = Self {
            id,
            kind: input.kind,
            reference_id: input.reference_id,
            description: input.description.trim().to_string(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            discount: Discount::from_parts(input.discount_percent, input.discount_amount)?,
            tax_percent: input.tax_percent.unwrap_or(Decimal::ZERO),
            notes: input.notes,
        };
        item.validate()?;
        Ok(item)
    }

    /// Return a validated copy with the patch applied; `self` is left untouched.
    pub fn patched(&self, patch: LineItemPatch) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(kind) = patch.kind {
            next.kind = kind;
        }
        if patch.reference_id.is_some() {
            next.reference_id = patch.reference_id;
        }
        if let Some(description) = patch.description {
            next.description = description.trim().to_string();
        }
        if let Some(quantity) = patch.quantity {
            next.quantity = quantity;
        }
        if let Some(unit_price) = patch.unit_price {
            next.unit_price = unit_price;
        }
        if patch.discount_percent.is_some() || patch.discount_amount.is_some() {
            next.discount = Discount::from_parts(patch.discount_percent, patch.discount_amount)?;
        }
        if let Some(tax_percent) = patch.tax_percent {
            next.tax_percent = tax_percent;
        }
        if patch.notes.is_some() {
            next.notes = patch.notes;
        }
        next.validate()?;
        Ok(next)
    }

    /// Deep copy under a fresh id, for snapshotting into another document.
    pub fn snapshot(&self) -> Self {
        Self {
            id: LineItemId::new(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.description.is_empty() {
            return Err(DomainError::validation("description must not be empty"));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.quantity > Decimal::from(MAX_QUANTITY) {
            return Err(DomainError::validation(format!(
                "quantity must not exceed {MAX_QUANTITY}"
            )));
        }
        if self.quantity.normalize().scale() > MAX_SCALE {
            return Err(DomainError::validation(format!(
                "quantity accepts at most {MAX_SCALE} fractional digits"
            )));
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::validation("unit_price must not be negative"));
        }
        if self.unit_price > Money::from_major(MAX_UNIT_PRICE) {
            return Err(DomainError::validation(format!(
                "unit_price must not exceed {MAX_UNIT_PRICE}"
            )));
        }
        if self.tax_percent.is_sign_negative()
            || self.tax_percent > Decimal::from(MAX_TAX_PERCENT)
        {
            return Err(DomainError::validation(format!(
                "tax_percent must be between 0 and {MAX_TAX_PERCENT}"
            )));
        }
        if self.tax_percent.normalize().scale() > MAX_SCALE {
            return Err(DomainError::validation(format!(
                "tax_percent accepts at most {MAX_SCALE} fractional digits"
            )));
        }
        if let Some(discount) = &self.discount {
            discount.validate()?;
            if let Discount::Amount(a) = discount {
                if a.to_decimal() > self.gross() {
                    return Err(DomainError::validation(
                        "discount_amount exceeds quantity x unit_price",
                    ));
                }
            }
        }
        Ok(())
    }

    /// `quantity x unit_price`, exact.
    pub fn gross(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_price.to_decimal())
    }

    /// This line's own discount, exact.
    pub fn discount_value(&self) -> Decimal {
        self.discount
            .as_ref()
            .map(|d| d.value_on(self.gross()))
            .unwrap_or(Decimal::ZERO)
    }

    /// Gross minus the line discount, before tax, exact.
    pub fn net(&self) -> Decimal {
        self.gross().saturating_sub(self.discount_value())
    }

    pub fn tax(&self) -> Decimal {
        self.net().saturating_mul(self.tax_percent) / Decimal::ONE_HUNDRED
    }

    /// Line total for display (net of discount, before tax).
    pub fn line_total(&self) -> Money {
        Money::from_decimal_rounded(self.net())
    }
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
