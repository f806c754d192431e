//! # Pricing Service
//!
//! The single entry point every caller (dish list, dish detail, chain
//! filter) goes through. It resolves the user's postal code, fetches recipe
//! lines, ingredients and offers from the [`ReferenceStore`], and runs the
//! pure pricing functions over them.
//!
//! "Today" is read from the injected [`Clock`] once per request and passed
//! down explicitly, so all lines of a request see the same date.
//!
//! ## Concurrency
//!
//! Recipe lines (and dishes, when listing) are fetched and priced
//! concurrently, then collected in their original order before anything is
//! summed. Lines are ordered by ingredient id before pricing so the totals
//! do not depend on the order the store returns them in. Nothing is cached
//! or mutated between requests; dropping a request future mid-way leaves no
//! state behind.

use chrono::NaiveDate;
use futures_util::future::try_join_all;
use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::aggregator::aggregate_lines;
use crate::chain_filter::{chain_search_regions, dish_available_for_chain, required_lines};
use crate::clock::{Clock, SystemClock};
use crate::errors::PricingError;
use crate::line_pricer::{price_line, LinePrice};
use crate::listing::{annotate_favorites, sort_listings, DishFilters, SortOrder};
use crate::model::{
    ChainId, Dish, DishListing, Ingredient, LinePricing, Offer, PricingResult, RecipeLine,
    RegionId,
};
use crate::offers::{rank_offers, select_best_offer};
use crate::regions::{resolve_regions, RegionScope};
use crate::store::ReferenceStore;

/// Default number of dishes fetched for a listing
pub const DEFAULT_LISTING_LIMIT: usize = 50;

/// A recipe line with everything needed to price and display it
#[derive(Debug, Clone)]
struct PricedLine {
    line: RecipeLine,
    ingredient: Ingredient,
    offers: Vec<Offer>,
    price: LinePrice,
}

pub struct PricingService<S, C = SystemClock> {
    store: S,
    clock: C,
    listing_limit: usize,
}

impl<S: ReferenceStore> PricingService<S, SystemClock> {
    /// Create a service reading "today" from the system clock
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: ReferenceStore, C: Clock> PricingService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            listing_limit: DEFAULT_LISTING_LIMIT,
        }
    }

    pub fn with_listing_limit(mut self, limit: usize) -> Self {
        self.listing_limit = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Price a dish for an optional postal code
    ///
    /// Without a postal code no regional offer applies and the offer price
    /// equals the baseline price. A postal code that maps to no region is
    /// rejected with [`PricingError::UnknownPostalCode`].
    #[tracing::instrument(skip(self))]
    pub async fn price_dish(
        &self,
        dish_id: &str,
        postal_code: Option<&str>,
    ) -> Result<PricingResult, PricingError> {
        let as_of = self.clock.today();
        let regions = self.pricing_regions(postal_code).await?;
        let dish = self.require_dish(dish_id).await?;

        let result = self.price_dish_in(&dish, &regions, as_of).await?;
        info!(
            "Priced dish {dish_id}: base {:.2}, offer {:.2}, {} offers",
            result.base_price, result.offer_price, result.available_offers_count
        );
        Ok(result)
    }

    /// Line-level pricing details of a dish, for the dish detail page
    ///
    /// Required lines come first, then optional ones, each group sorted by
    /// ingredient name. The `line_price`s sum to the `offer_price` that
    /// [`Self::price_dish`] reports for the same inputs.
    #[tracing::instrument(skip(self))]
    pub async fn price_dish_ingredients(
        &self,
        dish_id: &str,
        postal_code: Option<&str>,
    ) -> Result<Vec<LinePricing>, PricingError> {
        let as_of = self.clock.today();
        let regions = self.pricing_regions(postal_code).await?;
        self.require_dish(dish_id).await?;

        let priced = self.price_lines(dish_id, &regions, as_of).await?;

        let mut details: Vec<LinePricing> = priced
            .into_iter()
            .map(|p| LinePricing {
                offers: rank_offers(&p.offers, &p.line.ingredient_id, &regions, as_of),
                line_price: p.price.effective_price(),
                baseline_price: p.price.baseline_price,
                offer_price: p.price.offer_price,
                has_offer: p.price.has_offer,
                price_baseline_per_unit: p.ingredient.price_baseline_per_unit,
                ingredient_name: p.ingredient.name_canonical,
                ingredient_id: p.line.ingredient_id,
                qty: p.line.qty,
                unit: p.line.unit,
                optional: p.line.optional,
                role: p.line.role,
            })
            .collect();

        details.sort_by(|a, b| {
            a.optional
                .cmp(&b.optional)
                .then_with(|| a.ingredient_name.cmp(&b.ingredient_name))
                .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
        });

        Ok(details)
    }

    /// Check whether a dish has a discounted required ingredient at a chain
    ///
    /// A missing or unknown postal code searches all regions of the chain.
    /// A malformed postal code is still rejected.
    #[tracing::instrument(skip(self))]
    pub async fn is_dish_available_for_chain(
        &self,
        dish_id: &str,
        chain_id: ChainId,
        postal_code: Option<&str>,
    ) -> Result<bool, PricingError> {
        let as_of = self.clock.today();
        let scope = resolve_regions(&self.store, postal_code).await?;
        let chain_regions = self.store.regions_for_chain(chain_id).await?;
        let regions = chain_search_regions(&scope, chain_regions);

        self.require_dish(dish_id).await?;
        self.available_in(dish_id, &regions, as_of).await
    }

    /// List priced dishes matching `filters`
    ///
    /// Dishes above `max_price` are dropped. When a chain filter names a
    /// known chain, only dishes available there are kept; an unknown chain
    /// name leaves the list unfiltered.
    #[tracing::instrument(skip(self, favorites))]
    pub async fn list_dishes(
        &self,
        filters: &DishFilters,
        order: SortOrder,
        favorites: &[String],
    ) -> Result<Vec<DishListing>, PricingError> {
        let as_of = self.clock.today();
        let plz = filters.plz.as_deref();
        let scope = resolve_regions(&self.store, plz).await?;
        let regions = scope.pricing_regions()?;

        let dishes = self
            .store
            .list_dishes(&filters.to_query(self.listing_limit))
            .await?;
        debug!("Listing {} candidate dishes", dishes.len());

        let priced = try_join_all(dishes.into_iter().map(|dish| {
            let regions = &regions;
            async move {
                let pricing = self.price_dish_in(&dish, regions, as_of).await?;
                if pricing.base_price == 0.0 && pricing.offer_price == 0.0 {
                    warn!(
                        "Dish {} ({}) has zero pricing. PLZ: {}",
                        dish.dish_id,
                        dish.name,
                        plz.unwrap_or("none")
                    );
                }
                Ok::<_, PricingError>(DishListing {
                    dish,
                    pricing,
                    is_favorite: false,
                })
            }
        }))
        .await?;

        let mut listings: Vec<DishListing> = priced
            .into_iter()
            .filter(|l| filters.within_max_price(l))
            .collect();

        if let Some(chain_name) = filters.chain_name() {
            listings = self
                .filter_by_chain(listings, chain_name, &scope, as_of)
                .await?;
        }

        annotate_favorites(&mut listings, favorites);
        sort_listings(&mut listings, order);

        info!("Listed {} dishes", listings.len());
        Ok(listings)
    }

    async fn filter_by_chain(
        &self,
        listings: Vec<DishListing>,
        chain_name: &str,
        scope: &RegionScope,
        as_of: NaiveDate,
    ) -> Result<Vec<DishListing>, PricingError> {
        let Some(chain) = self.store.get_chain_by_name(chain_name).await? else {
            warn!("Unknown chain {chain_name:?}, not filtering by chain");
            return Ok(listings);
        };

        let chain_regions = self.store.regions_for_chain(chain.chain_id).await?;
        let regions = chain_search_regions(scope, chain_regions);

        let flags = try_join_all(
            listings
                .iter()
                .map(|l| self.available_in(&l.dish.dish_id, &regions, as_of)),
        )
        .await?;

        Ok(listings
            .into_iter()
            .zip(flags)
            .filter_map(|(listing, available)| available.then_some(listing))
            .collect())
    }

    async fn pricing_regions(
        &self,
        postal_code: Option<&str>,
    ) -> Result<BTreeSet<RegionId>, PricingError> {
        resolve_regions(&self.store, postal_code)
            .await?
            .pricing_regions()
    }

    async fn require_dish(&self, dish_id: &str) -> Result<Dish, PricingError> {
        self.store
            .get_dish(dish_id)
            .await?
            .ok_or_else(|| PricingError::DishNotFound(dish_id.to_string()))
    }

    async fn price_dish_in(
        &self,
        dish: &Dish,
        regions: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<PricingResult, PricingError> {
        let priced = self.price_lines(&dish.dish_id, regions, as_of).await?;
        Ok(aggregate_lines(&dish.dish_id, priced.iter().map(|p| &p.price)))
    }

    async fn price_lines(
        &self,
        dish_id: &str,
        regions: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<Vec<PricedLine>, PricingError> {
        let mut lines = self.store.get_recipe_lines(dish_id).await?;
        lines.sort_by(|a, b| a.ingredient_id.cmp(&b.ingredient_id));

        try_join_all(
            lines
                .into_iter()
                .map(|line| self.price_recipe_line(line, regions, as_of)),
        )
        .await
    }

    async fn price_recipe_line(
        &self,
        line: RecipeLine,
        regions: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<PricedLine, PricingError> {
        let ingredient = self
            .store
            .get_ingredient(&line.ingredient_id)
            .await?
            .ok_or_else(|| PricingError::IngredientNotFound(line.ingredient_id.clone()))?;

        let offers = self.active_offers(&line.ingredient_id, regions, as_of).await?;
        let best = select_best_offer(&offers, &line.ingredient_id, regions, as_of);
        let price = price_line(&line, &ingredient, best);

        debug!(
            "Line {} {} {}: baseline {:?}, offer {:?}",
            line.qty, line.unit, line.ingredient_id, price.baseline_price, price.offer_price
        );

        Ok(PricedLine {
            line,
            ingredient,
            offers,
            price,
        })
    }

    async fn active_offers(
        &self,
        ingredient_id: &str,
        regions: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<Vec<Offer>, PricingError> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .get_active_offers(ingredient_id, regions, as_of)
            .await?)
    }

    async fn available_in(
        &self,
        dish_id: &str,
        regions: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<bool, PricingError> {
        if regions.is_empty() {
            return Ok(false);
        }

        let lines = self.store.get_recipe_lines(dish_id).await?;
        let offers = try_join_all(
            required_lines(&lines).map(|l| self.active_offers(&l.ingredient_id, regions, as_of)),
        )
        .await?
        .concat();

        Ok(dish_available_for_chain(&lines, &offers, regions, as_of))
    }
}
