//! # Region Resolver
//!
//! Turns a user's postal code (PLZ) into the set of advertising regions
//! whose offers apply to them.
//!
//! Three outcomes are kept apart because callers treat them differently:
//!
//! - no postal code supplied: pricing runs without regional offers
//! - postal code known: the regions it maps to
//! - postal code unknown: pricing rejects the request, while the chain
//!   filter falls back to all regions of the chain

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;

use crate::errors::PricingError;
use crate::model::RegionId;
use crate::store::ReferenceStore;

lazy_static! {
    static ref PLZ_REGEX: Regex = Regex::new(r"^\d{5}$").expect("PLZ pattern should be valid");
}

/// Result of resolving an optional postal code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionScope {
    /// No postal code was given
    NoPostalCode,
    /// The postal code maps to at least one region
    Resolved {
        plz: String,
        region_ids: BTreeSet<RegionId>,
    },
    /// The postal code is well-formed but maps to no region
    UnknownPostalCode(String),
}

impl RegionScope {
    /// Build a scope from the regions a store returned for `plz`
    pub fn from_lookup(plz: &str, region_ids: impl IntoIterator<Item = RegionId>) -> Self {
        let region_ids: BTreeSet<RegionId> = region_ids.into_iter().collect();
        if region_ids.is_empty() {
            RegionScope::UnknownPostalCode(plz.to_string())
        } else {
            RegionScope::Resolved {
                plz: plz.to_string(),
                region_ids,
            }
        }
    }

    /// Regions to search for offers; empty unless the postal code resolved
    pub fn region_ids(&self) -> BTreeSet<RegionId> {
        match self {
            RegionScope::Resolved { region_ids, .. } => region_ids.clone(),
            RegionScope::NoPostalCode | RegionScope::UnknownPostalCode(_) => BTreeSet::new(),
        }
    }

    /// Regions for dish pricing, rejecting unknown postal codes
    pub fn pricing_regions(&self) -> Result<BTreeSet<RegionId>, PricingError> {
        match self {
            RegionScope::UnknownPostalCode(plz) => {
                Err(PricingError::UnknownPostalCode(plz.clone()))
            }
            _ => Ok(self.region_ids()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, RegionScope::UnknownPostalCode(_))
    }
}

/// Validate an optional postal code
///
/// Blank input counts as "no postal code". Anything else must be exactly
/// five digits once surrounding whitespace is removed.
///
/// # Examples
///
/// ```rust
/// use mealdeal::regions::normalize_postal_code;
///
/// assert_eq!(normalize_postal_code(Some(" 10115 ")).unwrap(), Some("10115".to_string()));
/// assert_eq!(normalize_postal_code(Some("   ")).unwrap(), None);
/// assert!(normalize_postal_code(Some("1011")).is_err());
/// ```
pub fn normalize_postal_code(postal_code: Option<&str>) -> Result<Option<String>, PricingError> {
    let Some(raw) = postal_code else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if !PLZ_REGEX.is_match(trimmed) {
        return Err(PricingError::InvalidPostalCode(raw.to_string()));
    }

    Ok(Some(trimmed.to_string()))
}

/// Resolve an optional postal code against the reference store
pub async fn resolve_regions<S: ReferenceStore + ?Sized>(
    store: &S,
    postal_code: Option<&str>,
) -> Result<RegionScope, PricingError> {
    let Some(plz) = normalize_postal_code(postal_code)? else {
        debug!("No postal code supplied, pricing without regional offers");
        return Ok(RegionScope::NoPostalCode);
    };

    let region_ids = store.regions_for_postal_code(&plz).await?;
    let scope = RegionScope::from_lookup(&plz, region_ids);
    debug!("Resolved postal code {plz} to {:?}", scope.region_ids());
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PostalCodeMapping, Region};
    use crate::store::InMemoryStore;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_region(Region { region_id: 500, chain_id: 1, label: None })
            .with_region(Region { region_id: 501, chain_id: 2, label: None })
            .with_postal_code(PostalCodeMapping { plz: "10115".into(), region_id: 500 })
            .with_postal_code(PostalCodeMapping { plz: "10115".into(), region_id: 501 })
            .with_postal_code(PostalCodeMapping { plz: "80331".into(), region_id: 501 })
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code(None).unwrap(), None);
        assert_eq!(normalize_postal_code(Some("")).unwrap(), None);
        assert_eq!(normalize_postal_code(Some("80331")).unwrap(), Some("80331".into()));
        assert_eq!(
            normalize_postal_code(Some("8033a")),
            Err(PricingError::InvalidPostalCode("8033a".into()))
        );
        assert!(normalize_postal_code(Some("803311")).is_err());
    }

    #[test]
    fn test_scope_from_lookup() {
        let scope = RegionScope::from_lookup("10115", vec![501, 500, 500]);
        assert_eq!(scope.region_ids(), BTreeSet::from([500, 501]));
        assert!(!scope.is_unknown());

        let unknown = RegionScope::from_lookup("99999", Vec::new());
        assert!(unknown.is_unknown());
        assert!(unknown.region_ids().is_empty());
        assert_eq!(
            unknown.pricing_regions(),
            Err(PricingError::UnknownPostalCode("99999".into()))
        );

        assert_eq!(RegionScope::NoPostalCode.pricing_regions(), Ok(BTreeSet::new()));
    }

    #[tokio::test]
    async fn test_resolve_regions_against_store() {
        let store = store();

        let scope = resolve_regions(&store, Some("10115")).await.unwrap();
        assert_eq!(scope.region_ids(), BTreeSet::from([500, 501]));

        let scope = resolve_regions(&store, Some("80331")).await.unwrap();
        assert_eq!(scope.region_ids(), BTreeSet::from([501]));

        let scope = resolve_regions(&store, None).await.unwrap();
        assert_eq!(scope, RegionScope::NoPostalCode);

        let scope = resolve_regions(&store, Some("99999")).await.unwrap();
        assert_eq!(scope, RegionScope::UnknownPostalCode("99999".into()));
    }
}
