//! # Chain Availability Filter
//!
//! Answers "could this dish be bought discounted at this chain?", used to
//! narrow dish listings to one retail chain. Unlike dish pricing, a missing
//! or unknown postal code does not empty the region scope: it widens it to
//! every region of the chain. A resolved postal code searches the regions
//! it maps to, as they are.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::model::{Offer, RecipeLine, RegionId};
use crate::offers::active_candidates;
use crate::regions::RegionScope;

/// Regions to search for chain offers
///
/// The regions of the user's postal code when it resolved, otherwise all
/// regions of the chain.
pub fn chain_search_regions(
    scope: &RegionScope,
    chain_regions: impl IntoIterator<Item = RegionId>,
) -> BTreeSet<RegionId> {
    let user_regions = scope.region_ids();
    if user_regions.is_empty() {
        chain_regions.into_iter().collect()
    } else {
        user_regions
    }
}

/// Recipe lines that can establish chain availability
pub fn required_lines(lines: &[RecipeLine]) -> impl Iterator<Item = &RecipeLine> {
    lines.iter().filter(|l| !l.optional)
}

/// Check whether any required recipe line has an active offer in `region_ids`
///
/// Optional lines never count.
pub fn dish_available_for_chain(
    lines: &[RecipeLine],
    offers: &[Offer],
    region_ids: &BTreeSet<RegionId>,
    as_of: NaiveDate,
) -> bool {
    if region_ids.is_empty() {
        return false;
    }

    required_lines(lines)
        .any(|line| !active_candidates(offers, &line.ingredient_id, region_ids, as_of).is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 1, 15)
    }

    fn offer(id: i64, region: i64, ingredient: &str) -> Offer {
        Offer::new(id, region, ingredient, 1.0, 1.0, "kg", date(2025, 1, 13), date(2025, 1, 19))
    }

    fn recipe() -> Vec<RecipeLine> {
        vec![
            RecipeLine::new("D001", "I001", 500.0, "g"),
            RecipeLine::new("D001", "I002", 1.0, "Bund").optional(),
        ]
    }

    #[test]
    fn test_required_line_with_offer_makes_dish_available() {
        let offers = vec![offer(1, 500, "I001")];

        assert!(dish_available_for_chain(&recipe(), &offers, &BTreeSet::from([500]), today()));
    }

    #[test]
    fn test_optional_line_never_counts() {
        let offers = vec![offer(1, 500, "I002")];

        assert!(!dish_available_for_chain(&recipe(), &offers, &BTreeSet::from([500]), today()));
    }

    #[test]
    fn test_offer_outside_regions_or_window_does_not_count() {
        let mut expired = offer(2, 500, "I001");
        expired.valid_to = date(2025, 1, 14);
        let offers = vec![offer(1, 501, "I001"), expired];

        assert!(!dish_available_for_chain(&recipe(), &offers, &BTreeSet::from([500]), today()));
    }

    #[test]
    fn test_empty_region_set_is_unavailable() {
        let offers = vec![offer(1, 500, "I001")];

        assert!(!dish_available_for_chain(&recipe(), &offers, &BTreeSet::new(), today()));
    }

    #[test]
    fn test_search_regions_fall_back_to_chain() {
        let chain = vec![500, 502];

        let none = chain_search_regions(&RegionScope::NoPostalCode, chain.clone());
        assert_eq!(none, BTreeSet::from([500, 502]));

        let unknown = chain_search_regions(&RegionScope::UnknownPostalCode("99999".into()), chain.clone());
        assert_eq!(unknown, BTreeSet::from([500, 502]));

        let resolved =
            chain_search_regions(&RegionScope::from_lookup("10115", vec![500, 501]), chain.clone());
        assert_eq!(resolved, BTreeSet::from([500, 501]));
    }

    #[test]
    fn test_resolved_regions_are_used_even_outside_the_chain() {
        let chain = vec![500, 502];

        let elsewhere = chain_search_regions(&RegionScope::from_lookup("80331", vec![501]), chain);

        assert_eq!(elsewhere, BTreeSet::from([501]));
    }
}
