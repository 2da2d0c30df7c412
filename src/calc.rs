//! Line and document arithmetic for sales and quotes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub quantity: i64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub line_total: f64,
}

/// Computes one line. `discount` is a percentage and is clamped to `[0, 100]`;
/// negative prices or quantities count as zero.
pub fn line_amounts(price_at_sale: f64, quantity: i64, discount: f64) -> LineAmounts {
    let price = non_negative(price_at_sale);
    let quantity = quantity.max(0);
    let discount = clamp_discount(discount);

    let subtotal = price * quantity as f64;
    let discount_amount = subtotal * (discount / 100.0);
    LineAmounts {
        quantity,
        subtotal,
        discount_amount,
        line_total: subtotal - discount_amount,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Sum of subtotals, before discounts.
    pub gross: f64,
    pub discount: f64,
    /// Document total: sum of line totals.
    pub net: f64,
    pub quantity: i64,
}

impl Totals {
    pub fn add(&mut self, line: &LineAmounts) {
        self.gross += line.subtotal;
        self.discount += line.discount_amount;
        self.net += line.line_total;
        self.quantity = self.quantity.saturating_add(line.quantity);
    }
}

pub fn totals<'a, I>(lines: I) -> Totals
where
    I: IntoIterator<Item = &'a LineAmounts>,
{
    let mut out = Totals::default();
    for line in lines {
        out.add(line);
    }
    out
}

/// Lenient numeric read of form input: empty, non-numeric, NaN and infinite
/// values are 0.
pub fn parse_number(input: &str) -> f64 {
    match input.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Largest quantity one line can hold; `sale_items.quantity` is a Postgres
/// `integer`.
pub const MAX_QUANTITY: i64 = i32::MAX as i64;

/// Whole units; fractional input truncates, negatives count as 0 and values
/// above [`MAX_QUANTITY`] are capped.
pub fn parse_quantity(input: &str) -> i64 {
    let v = parse_number(input).trunc();
    if v <= 0.0 {
        0
    } else if v >= MAX_QUANTITY as f64 {
        MAX_QUANTITY
    } else {
        v as i64
    }
}

pub fn parse_discount(input: &str) -> f64 {
    clamp_discount(parse_number(input))
}

pub fn clamp_discount(discount: f64) -> f64 {
    if discount.is_finite() {
        discount.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Rounds to paise. Applied when amounts leave the client, never in between.
pub fn round_money(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}
