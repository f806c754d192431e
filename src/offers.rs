//! # Offer Selector
//!
//! Picks the cheapest active offer for an ingredient among the offers of a
//! set of regions, and ranks all active offers for the ingredient detail
//! view.
//!
//! An offer's effective unit price is its pack price divided by its pack
//! size, in the offer's own unit. Candidates are compared on the price per
//! base unit of the unit family (g, ml, piece) so a 1 kg pack and a 500 g
//! pack compare fairly; for candidates sharing a unit this orders them
//! exactly as the effective unit price does. Ties are ordered by ascending
//! offer id.

use chrono::NaiveDate;
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::model::{Offer, RankedOffer, RegionId};
use crate::units::{to_base_quantity, Unit};

/// Pack price divided by pack size, in the offer's own unit
pub fn effective_unit_price(offer: &Offer) -> f64 {
    offer.unit_price()
}

/// Price per base unit (g, ml, piece, or the offer's own unknown unit)
///
/// The key offers are compared on.
pub fn base_unit_price(offer: &Offer) -> f64 {
    let base_pack = to_base_quantity(offer.pack_size, &Unit::parse(&offer.unit_base));
    offer.price_total / base_pack
}

fn compare_offers(a: &Offer, b: &Offer) -> Ordering {
    base_unit_price(a)
        .total_cmp(&base_unit_price(b))
        .then_with(|| a.offer_id.cmp(&b.offer_id))
}

/// Offers for `ingredient_id` in `region_ids` that are valid on `as_of`
///
/// An empty region set yields no candidates.
pub fn active_candidates<'a>(
    offers: &'a [Offer],
    ingredient_id: &str,
    region_ids: &BTreeSet<RegionId>,
    as_of: NaiveDate,
) -> Vec<&'a Offer> {
    offers
        .iter()
        .filter(|o| {
            o.ingredient_id == ingredient_id
                && region_ids.contains(&o.region_id)
                && o.is_active_on(as_of)
                && o.pack_size > 0.0
        })
        .collect()
}

/// Select the cheapest offer
///
/// Returns `None` when no offer is active for the ingredient in the given
/// regions on `as_of`.
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveDate;
/// use mealdeal::model::Offer;
/// use mealdeal::offers::select_best_offer;
/// use std::collections::BTreeSet;
///
/// let from = NaiveDate::from_ymd_opt(2025, 1, 13).unwrap();
/// let to = NaiveDate::from_ymd_opt(2025, 1, 19).unwrap();
/// let offers = vec![
///     Offer::new(1, 500, "I001", 3.0, 2.0, "kg", from, to),
///     Offer::new(2, 500, "I001", 1.2, 1.0, "kg", from, to),
/// ];
///
/// let best = select_best_offer(&offers, "I001", &BTreeSet::from([500]), from).unwrap();
/// assert_eq!(best.offer_id, 2);
/// ```
pub fn select_best_offer<'a>(
    offers: &'a [Offer],
    ingredient_id: &str,
    region_ids: &BTreeSet<RegionId>,
    as_of: NaiveDate,
) -> Option<&'a Offer> {
    let best = active_candidates(offers, ingredient_id, region_ids, as_of)
        .into_iter()
        .min_by(|a, b| compare_offers(a, b));

    if let Some(offer) = best {
        debug!(
            "Best offer for {ingredient_id}: #{} at {:.2}/{}",
            offer.offer_id,
            effective_unit_price(offer),
            offer.unit_base
        );
    }

    best
}

/// Rank every active offer, cheapest first, flagging the cheapest ones
///
/// All offers sharing the minimum price per base unit get `is_lowest`.
pub fn rank_offers(
    offers: &[Offer],
    ingredient_id: &str,
    region_ids: &BTreeSet<RegionId>,
    as_of: NaiveDate,
) -> Vec<RankedOffer> {
    let mut candidates = active_candidates(offers, ingredient_id, region_ids, as_of);
    candidates.sort_by(|a, b| compare_offers(a, b));

    let lowest = candidates.first().map(|o| base_unit_price(o));

    candidates
        .into_iter()
        .map(|offer| RankedOffer {
            offer: offer.clone(),
            effective_unit_price: effective_unit_price(offer),
            is_lowest: Some(base_unit_price(offer)) == lowest,
        })
        .collect()
}
