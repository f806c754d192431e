//! # Dish Price Aggregator
//!
//! Reduces priced recipe lines into the dish-level pricing summary. All
//! lines, required and optional, count towards the totals.

use serde::{Deserialize, Serialize};

use crate::line_pricer::LinePrice;
use crate::model::PricingResult;

/// Running totals over priced lines
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceTotals {
    pub base_price: f64,
    pub offer_price: f64,
    pub available_offers_count: usize,
}

impl PriceTotals {
    pub fn add(&mut self, line: &LinePrice) {
        self.base_price += line.baseline_or_zero();
        self.offer_price += if line.has_offer {
            line.offer_price.unwrap_or(0.0)
        } else {
            line.baseline_or_zero()
        };
        if line.has_offer {
            self.available_offers_count += 1;
        }
    }

    pub fn savings(&self) -> f64 {
        (self.base_price - self.offer_price).max(0.0)
    }

    pub fn savings_percent(&self) -> f64 {
        if self.base_price == 0.0 {
            0.0
        } else {
            100.0 * self.savings() / self.base_price
        }
    }

    pub fn into_result(self, dish_id: &str) -> PricingResult {
        PricingResult {
            dish_id: dish_id.to_string(),
            base_price: self.base_price,
            offer_price: self.offer_price,
            savings: self.savings(),
            savings_percent: self.savings_percent(),
            available_offers_count: self.available_offers_count,
        }
    }
}

/// Sum priced lines, in the order given, into a [`PricingResult`]
///
/// # Examples
///
/// ```rust
/// use mealdeal::aggregator::aggregate_lines;
/// use mealdeal::line_pricer::LinePrice;
///
/// let lines = [
///     LinePrice { baseline_price: Some(1.0), offer_price: Some(0.8), has_offer: true },
///     LinePrice { baseline_price: Some(2.0), offer_price: None, has_offer: false },
/// ];
///
/// let result = aggregate_lines("D001", &lines);
/// assert_eq!(result.base_price, 3.0);
/// assert_eq!(result.available_offers_count, 1);
/// ```
pub fn aggregate_lines<'a>(
    dish_id: &str,
    lines: impl IntoIterator<Item = &'a LinePrice>,
) -> PricingResult {
    let mut totals = PriceTotals::default();
    for line in lines {
        totals.add(line);
    }
    totals.into_result(dish_id)
}
