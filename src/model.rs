//! # Pricing Data Model
//!
//! This module defines the reference data the pricing core reads (dishes,
//! ingredients, recipe lines, offers, regions) and the derived results it
//! produces. Reference data is read-only to the pricing logic; derived
//! results are recomputed on every request.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use mealdeal::model::{Ingredient, Offer, RecipeLine};
//!
//! let pasta = Ingredient::new("I001", "Spaghetti", "kg").with_baseline_price(2.0);
//! let line = RecipeLine::new("D001", "I001", 500.0, "g").with_role("base");
//! let offer = Offer::new(
//!     1,
//!     500,
//!     "I001",
//!     3.0,
//!     2.0,
//!     "kg",
//!     NaiveDate::from_ymd_opt(2025, 1, 13).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 1, 19).unwrap(),
//! );
//! assert!(offer.is_active_on(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()));
//! # let _ = (pasta, line);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type DishId = String;
pub type IngredientId = String;
pub type RegionId = i64;
pub type ChainId = i64;
pub type OfferId = i64;

/// A catalogue ingredient with its reference (non-discounted) price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub ingredient_id: IngredientId,

    /// Canonical display name (e.g., "Spaghetti", "Hähnchenbrust")
    pub name_canonical: String,

    /// Unit the baseline price refers to (e.g., "kg", "l", "Stück")
    pub unit_default: String,

    /// Reference price per `unit_default`
    pub price_baseline_per_unit: Option<f64>,

    pub allergen_tags: Vec<String>,

    pub notes: Option<String>,
}

/// A meal definition; its recipe is stored separately as [`RecipeLine`]s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub dish_id: DishId,
    pub name: String,
    pub category: String,
    pub is_quick: bool,
    pub is_meal_prep: bool,
    pub season: Option<String>,
    pub cuisine: Option<String>,
    pub notes: Option<String>,
}

/// One (dish, ingredient) pairing of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub dish_id: DishId,
    pub ingredient_id: IngredientId,

    /// Quantity in `unit`, always positive
    pub qty: f64,

    /// Unit as written in the recipe, may differ from the ingredient's default unit
    pub unit: String,

    pub optional: bool,

    /// Free-form role label (e.g., "base", "protein", "garnish")
    pub role: Option<String>,
}

/// A time-bounded regional price for a pack of one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: OfferId,
    pub region_id: RegionId,
    pub ingredient_id: IngredientId,

    /// Price for the whole pack
    pub price_total: f64,

    /// Pack size expressed in `unit_base`, always positive
    pub pack_size: f64,

    pub unit_base: String,

    /// First day the offer is valid (inclusive)
    pub valid_from: NaiveDate,

    /// Last day the offer is valid (inclusive)
    pub valid_to: NaiveDate,

    /// Where the offer came from (e.g., a leaflet name)
    pub source: Option<String>,

    pub source_ref_id: Option<String>,
}

/// An advertising/pricing region of one retail chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: RegionId,
    pub chain_id: ChainId,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: ChainId,
    pub chain_name: String,
}

/// Maps one postal code (PLZ) to one region; a PLZ may appear many times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCodeMapping {
    pub plz: String,
    pub region_id: RegionId,
}

/// Dish-level pricing summary, derived and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub dish_id: DishId,
    pub base_price: f64,
    pub offer_price: f64,

    /// `max(0, base_price - offer_price)`
    pub savings: f64,

    /// Percentage of `base_price` saved; 0 when `base_price` is 0
    pub savings_percent: f64,

    /// Number of recipe lines with an applicable offer
    pub available_offers_count: usize,
}

/// An active offer annotated for ingredient-detail display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOffer {
    pub offer: Offer,

    /// `price_total / pack_size`, per the offer's own unit
    pub effective_unit_price: f64,

    /// True on every offer achieving the minimum price per base unit
    pub is_lowest: bool,
}

/// Pricing details of one recipe line, as shown on the dish detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePricing {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub qty: f64,
    pub unit: String,
    pub optional: bool,
    pub role: Option<String>,
    pub price_baseline_per_unit: Option<f64>,
    pub baseline_price: Option<f64>,
    pub offer_price: Option<f64>,
    pub has_offer: bool,

    /// Price this line contributes to the dish's offer price
    pub line_price: f64,

    /// All active offers for this ingredient in the resolved regions
    pub offers: Vec<RankedOffer>,
}

/// A dish with its pricing summary, as shown in the dish list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishListing {
    pub dish: Dish,
    pub pricing: PricingResult,
    pub is_favorite: bool,
}

impl DishListing {
    /// The price a shopper pays today
    pub fn current_price(&self) -> f64 {
        self.pricing.offer_price
    }
}

impl Ingredient {
    /// Create an ingredient without a baseline price
    pub fn new(ingredient_id: &str, name_canonical: &str, unit_default: &str) -> Self {
        Self {
            ingredient_id: ingredient_id.to_string(),
            name_canonical: name_canonical.to_string(),
            unit_default: unit_default.to_string(),
            price_baseline_per_unit: None,
            allergen_tags: Vec::new(),
            notes: None,
        }
    }

    pub fn with_baseline_price(mut self, price_per_unit: f64) -> Self {
        self.price_baseline_per_unit = Some(price_per_unit);
        self
    }

    pub fn with_allergens(mut self, tags: &[&str]) -> Self {
        self.allergen_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

impl Dish {
    pub fn new(dish_id: &str, name: &str, category: &str) -> Self {
        Self {
            dish_id: dish_id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            is_quick: false,
            is_meal_prep: false,
            season: None,
            cuisine: None,
            notes: None,
        }
    }

    pub fn quick(mut self) -> Self {
        self.is_quick = true;
        self
    }

    pub fn meal_prep(mut self) -> Self {
        self.is_meal_prep = true;
        self
    }

    pub fn with_cuisine(mut self, cuisine: &str) -> Self {
        self.cuisine = Some(cuisine.to_string());
        self
    }
}

impl RecipeLine {
    /// Create a required recipe line
    pub fn new(dish_id: &str, ingredient_id: &str, qty: f64, unit: &str) -> Self {
        Self {
            dish_id: dish_id.to_string(),
            ingredient_id: ingredient_id.to_string(),
            qty,
            unit: unit.to_string(),
            optional: false,
            role: None,
        }
    }

    /// Mark this line as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

impl Offer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        offer_id: OfferId,
        region_id: RegionId,
        ingredient_id: &str,
        price_total: f64,
        pack_size: f64,
        unit_base: &str,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
    ) -> Self {
        Self {
            offer_id,
            region_id,
            ingredient_id: ingredient_id.to_string(),
            price_total,
            pack_size,
            unit_base: unit_base.to_string(),
            valid_from,
            valid_to,
            source: None,
            source_ref_id: None,
        }
    }

    pub fn with_source(mut self, source: &str, source_ref_id: &str) -> Self {
        self.source = Some(source.to_string());
        self.source_ref_id = Some(source_ref_id.to_string());
        self
    }

    /// Check whether `date` falls inside the inclusive validity window
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }

    /// Price per unit of `unit_base`
    pub fn unit_price(&self) -> f64 {
        self.price_total / self.pack_size
    }

    /// Stable deduplication key used when seeding offers
    ///
    /// Two offers with the same region, ingredient, price, pack size,
    /// validity window and source reference produce the same hash, whatever
    /// their `offer_id`.
    pub fn dedup_hash(&self) -> String {
        let key = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.region_id,
            self.ingredient_id,
            self.price_total,
            self.pack_size,
            self.valid_from.format("%Y-%m-%d"),
            self.valid_to.format("%Y-%m-%d"),
            self.source_ref_id.as_deref().unwrap_or(""),
        );

        to_base36(string_hash(&key))
    }
}

/// 31-multiplier hash over UTF-16 code units, wrapping at 32 bits
fn string_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let negative = value < 0;
    let mut n = (value as i64).unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_offer() -> Offer {
        Offer::new(7, 500, "I001", 3.0, 2.0, "kg", date(2025, 1, 13), date(2025, 1, 19))
            .with_source("Wochenprospekt", "KW03-17")
    }

    #[test]
    fn test_offer_validity_window_is_inclusive() {
        let offer = sample_offer();

        assert!(offer.is_active_on(date(2025, 1, 13)));
        assert!(offer.is_active_on(date(2025, 1, 16)));
        assert!(offer.is_active_on(date(2025, 1, 19)));
        assert!(!offer.is_active_on(date(2025, 1, 12)));
        assert!(!offer.is_active_on(date(2025, 1, 20)));
    }

    #[test]
    fn test_offer_unit_price() {
        assert_eq!(sample_offer().unit_price(), 1.5);
    }

    #[test]
    fn test_dedup_hash_ignores_offer_id() {
        let a = sample_offer();
        let mut b = sample_offer();
        b.offer_id = 99;

        assert_eq!(a.dedup_hash(), b.dedup_hash());
    }

    #[test]
    fn test_dedup_hash_changes_with_content() {
        let a = sample_offer();
        let mut b = sample_offer();
        b.price_total = 2.99;
        let mut c = sample_offer();
        c.source_ref_id = None;

        assert_ne!(a.dedup_hash(), b.dedup_hash());
        assert_ne!(a.dedup_hash(), c.dedup_hash());
    }

    #[test]
    fn test_string_hash_uses_utf16_code_units() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("abc"), 96354);
        // one astral char is two surrogates: 0xD83D * 31 + 0xDE00
        assert_eq!(string_hash("\u{1F600}"), 1772899);
    }

    #[test]
    fn test_base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(-36), "-10");
        assert_eq!(to_base36(i32::MIN), "-zik0zk");
    }

    #[test]
    fn test_builders() {
        let line = RecipeLine::new("D001", "I002", 1.0, "Stück")
            .optional()
            .with_role("garnish");
        assert!(line.optional);
        assert_eq!(line.role.as_deref(), Some("garnish"));

        let dish = Dish::new("D001", "Spaghetti Bolognese", "Pasta").quick();
        assert!(dish.is_quick);
        assert!(!dish.is_meal_prep);

        let ingredient = Ingredient::new("I003", "Milch", "l")
            .with_baseline_price(1.09)
            .with_allergens(&["lactose"]);
        assert_eq!(ingredient.price_baseline_per_unit, Some(1.09));
        assert_eq!(ingredient.allergen_tags, vec!["lactose".to_string()]);
    }
}
