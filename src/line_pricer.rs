//! # Ingredient Line Pricer
//!
//! Prices one recipe line: the baseline price from the ingredient's
//! reference price, and the offer price from the best active offer, both
//! converted into the recipe's quantity and unit.
//!
//! The two paths treat unconvertible units differently. The baseline path
//! falls back to multiplying the raw recipe quantity by the reference
//! price; the offer path drops the offer price for the line instead.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Ingredient, Offer, RecipeLine};
use crate::units::convert;

/// Priced recipe line
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinePrice {
    pub baseline_price: Option<f64>,
    pub offer_price: Option<f64>,

    /// An offer exists and its price could be computed
    pub has_offer: bool,
}

impl LinePrice {
    /// Price the line contributes to the dish total: offer, else baseline, else 0
    pub fn effective_price(&self) -> f64 {
        self.offer_price.or(self.baseline_price).unwrap_or(0.0)
    }

    pub fn baseline_or_zero(&self) -> f64 {
        self.baseline_price.unwrap_or(0.0)
    }
}

/// Baseline price of a recipe line, if the ingredient has a reference price
pub fn baseline_price(line: &RecipeLine, ingredient: &Ingredient) -> Option<f64> {
    let per_unit = ingredient.price_baseline_per_unit?;

    match convert(line.qty, &line.unit, &ingredient.unit_default) {
        Some(qty) => Some(qty * per_unit),
        None => {
            debug!(
                "Cannot convert {} {} to {} for {}, using raw quantity for baseline",
                line.qty, line.unit, ingredient.unit_default, ingredient.ingredient_id
            );
            Some(line.qty * per_unit)
        }
    }
}

/// Offer price of a recipe line; `None` when the units are unconvertible
pub fn offer_price(line: &RecipeLine, offer: &Offer) -> Option<f64> {
    if offer.pack_size <= 0.0 {
        return None;
    }

    match convert(line.qty, &line.unit, &offer.unit_base) {
        Some(qty) => Some(qty / offer.pack_size * offer.price_total),
        None => {
            debug!(
                "Cannot convert {} {} to offer #{} unit {}, ignoring offer",
                line.qty, line.unit, offer.offer_id, offer.unit_base
            );
            None
        }
    }
}

/// Price one recipe line against its ingredient and best offer
///
/// # Examples
///
/// ```rust
/// use mealdeal::line_pricer::price_line;
/// use mealdeal::model::{Ingredient, RecipeLine};
///
/// let ingredient = Ingredient::new("I001", "Spaghetti", "kg").with_baseline_price(2.0);
/// let line = RecipeLine::new("D001", "I001", 500.0, "g");
///
/// let price = price_line(&line, &ingredient, None);
/// assert_eq!(price.baseline_price, Some(1.0));
/// assert!(!price.has_offer);
/// ```
pub fn price_line(line: &RecipeLine, ingredient: &Ingredient, best_offer: Option<&Offer>) -> LinePrice {
    let baseline_price = baseline_price(line, ingredient);
    let offer_price = best_offer.and_then(|offer| offer_price(line, offer));

    LinePrice {
        baseline_price,
        offer_price,
        has_offer: offer_price.is_some(),
    }
}
