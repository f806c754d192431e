//! # Dish Listing
//!
//! Filters and sort orders for the dish list: category and meal flags are
//! pushed down to the store, price and chain filters run on priced dishes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::DishListing;
use crate::store::DishQuery;

/// Filter value meaning "no filter" for category and chain
pub const ALL: &str = "all";

/// Filters selected on the dish list page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DishFilters {
    pub category: Option<String>,

    /// Chain name; keeps dishes with a discounted required ingredient there
    pub chain: Option<String>,

    /// Upper bound on the current (offer) price
    pub max_price: Option<f64>,

    pub plz: Option<String>,
    pub is_quick: Option<bool>,
    pub is_meal_prep: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Cheapest first
    #[default]
    Price,
    /// Biggest savings first
    Savings,
    /// Alphabetical
    Name,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(SortOrder::Price),
            "savings" => Ok(SortOrder::Savings),
            "name" => Ok(SortOrder::Name),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

fn filter_value(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ALL))
}

impl DishFilters {
    /// Store query for these filters, using `default_limit` when none is set
    pub fn to_query(&self, default_limit: usize) -> DishQuery {
        DishQuery {
            category: filter_value(&self.category).map(str::to_string),
            is_quick: self.is_quick,
            is_meal_prep: self.is_meal_prep,
            limit: self.limit.unwrap_or(default_limit),
        }
    }

    /// Chain name to filter by, if any
    pub fn chain_name(&self) -> Option<&str> {
        filter_value(&self.chain)
    }

    /// Check a priced dish against `max_price`
    pub fn within_max_price(&self, listing: &DishListing) -> bool {
        match self.max_price {
            Some(max) if max > 0.0 => listing.current_price() <= max,
            _ => true,
        }
    }
}

/// Mark listings whose dish is among the user's favorites
pub fn annotate_favorites(listings: &mut [DishListing], favorites: &[String]) {
    let favorites: HashSet<&str> = favorites.iter().map(String::as_str).collect();
    for listing in listings.iter_mut() {
        listing.is_favorite = favorites.contains(listing.dish.dish_id.as_str());
    }
}

/// Sort listings; ties are broken by dish id
pub fn sort_listings(listings: &mut [DishListing], order: SortOrder) {
    listings.sort_by(|a, b| {
        let primary = match order {
            SortOrder::Price => a.current_price().total_cmp(&b.current_price()),
            SortOrder::Savings => b.pricing.savings.total_cmp(&a.pricing.savings),
            SortOrder::Name => a.dish.name.cmp(&b.dish.name),
        };
        if primary == Ordering::Equal {
            a.dish.dish_id.cmp(&b.dish.dish_id)
        } else {
            primary
        }
    });
}
