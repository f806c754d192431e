//! # Reference Data Store
//!
//! The pricing core reads dishes, recipes, ingredients, offers and region
//! mappings through the [`ReferenceStore`] trait. Implementations:
//!
//! - [`InMemoryStore`]: an immutable snapshot, used by tests and for
//!   pricing against data already loaded into memory
//! - [`crate::db::PgStore`]: the PostgreSQL backed store
//!
//! Every method is a read. Failures are returned as `anyhow` errors and
//! reach callers as [`crate::errors::PricingError::Unavailable`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::model::{
    Chain, ChainId, Dish, Ingredient, Offer, PostalCodeMapping, RecipeLine, Region, RegionId,
};

/// Dish selection pushed down to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishQuery {
    pub category: Option<String>,
    pub is_quick: Option<bool>,
    pub is_meal_prep: Option<bool>,
    pub limit: usize,
}

impl Default for DishQuery {
    fn default() -> Self {
        Self {
            category: None,
            is_quick: None,
            is_meal_prep: None,
            limit: 50,
        }
    }
}

impl DishQuery {
    pub fn matches(&self, dish: &Dish) -> bool {
        self.category.as_ref().map_or(true, |c| &dish.category == c)
            && self.is_quick.map_or(true, |q| dish.is_quick == q)
            && self.is_meal_prep.map_or(true, |m| dish.is_meal_prep == m)
    }
}

/// Read-only queries the pricing core needs
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn get_dish(&self, dish_id: &str) -> Result<Option<Dish>>;

    /// Dishes matching `query`, ordered by dish id
    async fn list_dishes(&self, query: &DishQuery) -> Result<Vec<Dish>>;

    /// Recipe lines of a dish, required and optional
    async fn get_recipe_lines(&self, dish_id: &str) -> Result<Vec<RecipeLine>>;

    async fn get_ingredient(&self, ingredient_id: &str) -> Result<Option<Ingredient>>;

    /// Offers for one ingredient in any of `region_ids` that are valid on `as_of`
    async fn get_active_offers(
        &self,
        ingredient_id: &str,
        region_ids: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<Vec<Offer>>;

    /// Regions a postal code belongs to; empty when the code is unknown
    async fn regions_for_postal_code(&self, plz: &str) -> Result<Vec<RegionId>>;

    async fn regions_for_chain(&self, chain_id: ChainId) -> Result<Vec<RegionId>>;

    async fn get_chain_by_name(&self, chain_name: &str) -> Result<Option<Chain>>;
}

/// Reference data snapshot held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    dishes: Vec<Dish>,
    recipe_lines: Vec<RecipeLine>,
    ingredients: Vec<Ingredient>,
    offers: Vec<Offer>,
    regions: Vec<Region>,
    chains: Vec<Chain>,
    postal_codes: Vec<PostalCodeMapping>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dish(mut self, dish: Dish) -> Self {
        self.dishes.push(dish);
        self
    }

    /// Add a recipe line, replacing any line for the same (dish, ingredient)
    pub fn with_recipe_line(mut self, line: RecipeLine) -> Self {
        self.recipe_lines
            .retain(|l| !(l.dish_id == line.dish_id && l.ingredient_id == line.ingredient_id));
        self.recipe_lines.push(line);
        self
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    pub fn with_offer(mut self, offer: Offer) -> Self {
        self.offers.push(offer);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn with_postal_code(mut self, mapping: PostalCodeMapping) -> Self {
        self.postal_codes.push(mapping);
        self
    }
}

#[async_trait]
impl ReferenceStore for InMemoryStore {
    async fn get_dish(&self, dish_id: &str) -> Result<Option<Dish>> {
        Ok(self.dishes.iter().find(|d| d.dish_id == dish_id).cloned())
    }

    async fn list_dishes(&self, query: &DishQuery) -> Result<Vec<Dish>> {
        let mut dishes: Vec<Dish> = self
            .dishes
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.dish_id.cmp(&b.dish_id));
        dishes.truncate(query.limit);
        Ok(dishes)
    }

    async fn get_recipe_lines(&self, dish_id: &str) -> Result<Vec<RecipeLine>> {
        Ok(self
            .recipe_lines
            .iter()
            .filter(|l| l.dish_id == dish_id)
            .cloned()
            .collect())
    }

    async fn get_ingredient(&self, ingredient_id: &str) -> Result<Option<Ingredient>> {
        Ok(self
            .ingredients
            .iter()
            .find(|i| i.ingredient_id == ingredient_id)
            .cloned())
    }

    async fn get_active_offers(
        &self,
        ingredient_id: &str,
        region_ids: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<Vec<Offer>> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|o| {
                o.ingredient_id == ingredient_id
                    && region_ids.contains(&o.region_id)
                    && o.is_active_on(as_of)
            })
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.offer_id);
        Ok(offers)
    }

    async fn regions_for_postal_code(&self, plz: &str) -> Result<Vec<RegionId>> {
        Ok(self
            .postal_codes
            .iter()
            .filter(|m| m.plz == plz)
            .map(|m| m.region_id)
            .collect())
    }

    async fn regions_for_chain(&self, chain_id: ChainId) -> Result<Vec<RegionId>> {
        Ok(self
            .regions
            .iter()
            .filter(|r| r.chain_id == chain_id)
            .map(|r| r.region_id)
            .collect())
    }

    async fn get_chain_by_name(&self, chain_name: &str) -> Result<Option<Chain>> {
        Ok(self
            .chains
            .iter()
            .find(|c| c.chain_name == chain_name)
            .cloned())
    }
}
