//! # Unit Converter
//!
//! Converts recipe and offer quantities between units of the same family.
//! Only exact, factor-based conversions are supported: gram/kilogram and
//! milliliter/liter. Anything else (mass to volume, spoons, bunches, ...)
//! is unconvertible and reported as `None`, never guessed.
//!
//! Unit tokens are compared after trimming and lower-casing, and a few
//! spellings are folded onto the same unit (e.g. "Stück" and "Stk" are both
//! a piece).

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Measurement units known to the pricing core
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Grams
    Gram,
    /// Kilograms
    Kilogram,
    /// Milliliters
    Milliliter,
    /// Liters
    Liter,
    /// Individual pieces/items
    Piece,
    /// Any other token, stored normalized (e.g. "el", "bund", "prise")
    Other(String),
}

/// Unit families; conversions never cross a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitFamily {
    Mass,
    Volume,
    Count,
    Other,
}

lazy_static! {
    static ref UNIT_ALIASES: HashMap<&'static str, Unit> = {
        let mut m = HashMap::new();
        for token in ["g", "gr", "gram", "grams", "gramm"] {
            m.insert(token, Unit::Gram);
        }
        for token in ["kg", "kilo", "kilogram", "kilograms", "kilogramm"] {
            m.insert(token, Unit::Kilogram);
        }
        for token in ["ml", "milliliter", "millilitre", "milliliters"] {
            m.insert(token, Unit::Milliliter);
        }
        for token in ["l", "liter", "litre", "liters"] {
            m.insert(token, Unit::Liter);
        }
        for token in ["stück", "stk", "stk.", "st", "piece", "pieces", "pcs"] {
            m.insert(token, Unit::Piece);
        }
        m
    };
}

/// Trim and lower-case a unit token
pub fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}

impl Unit {
    /// Parse a unit token as written in recipes, ingredients or offers
    pub fn parse(token: &str) -> Self {
        let normalized = normalize_token(token);
        match UNIT_ALIASES.get(normalized.as_str()) {
            Some(unit) => unit.clone(),
            None => Unit::Other(normalized),
        }
    }

    pub fn family(&self) -> UnitFamily {
        match self {
            Unit::Gram | Unit::Kilogram => UnitFamily::Mass,
            Unit::Milliliter | Unit::Liter => UnitFamily::Volume,
            Unit::Piece => UnitFamily::Count,
            Unit::Other(_) => UnitFamily::Other,
        }
    }

    /// Multiplier from this unit to its family's base unit (g, ml, piece)
    fn base_factor(&self) -> Option<f64> {
        match self {
            Unit::Gram | Unit::Milliliter | Unit::Piece => Some(1.0),
            Unit::Kilogram | Unit::Liter => Some(1000.0),
            Unit::Other(_) => None,
        }
    }

    pub fn is_weight(&self) -> bool {
        self.family() == UnitFamily::Mass
    }

    pub fn is_volume(&self) -> bool {
        self.family() == UnitFamily::Volume
    }

    pub fn is_count(&self) -> bool {
        self.family() == UnitFamily::Count
    }

    pub fn display_name(&self) -> &str {
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Piece => "Stück",
            Unit::Other(token) => token,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Convert `quantity` from one unit token to another
///
/// Returns the quantity unchanged when both tokens name the same unit, the
/// scaled quantity for gram/kilogram and milliliter/liter pairs, and `None`
/// for every other pair.
///
/// # Examples
///
/// ```rust
/// use mealdeal::units::convert;
///
/// assert_eq!(convert(500.0, "g", "kg"), Some(0.5));
/// assert_eq!(convert(2.0, " Stück", "stk"), Some(2.0));
/// assert_eq!(convert(1.0, "EL", "ml"), None);
/// ```
pub fn convert(quantity: f64, from_unit: &str, to_unit: &str) -> Option<f64> {
    convert_units(quantity, &Unit::parse(from_unit), &Unit::parse(to_unit))
}

/// Same as [`convert`] for already parsed units
pub fn convert_units(quantity: f64, from: &Unit, to: &Unit) -> Option<f64> {
    if from == to {
        return Some(quantity);
    }

    if from.family() != to.family() {
        return None;
    }

    match from.family() {
        UnitFamily::Mass | UnitFamily::Volume => {
            let from_factor = from.base_factor()?;
            let to_factor = to.base_factor()?;
            Some(quantity * from_factor / to_factor)
        }
        UnitFamily::Count | UnitFamily::Other => None,
    }
}

/// Express `quantity` in its family's base unit (g, ml, piece)
///
/// Unknown units have no base and are returned as-is, so callers can still
/// compare quantities that share the same unknown token.
pub fn to_base_quantity(quantity: f64, unit: &Unit) -> f64 {
    match unit.base_factor() {
        Some(factor) => quantity * factor,
        None => quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_parse_folds_case_whitespace_and_aliases() {
        assert_eq!(Unit::parse(" KG "), Unit::Kilogram);
        assert_eq!(Unit::parse("Gramm"), Unit::Gram);
        assert_eq!(Unit::parse("L"), Unit::Liter);
        assert_eq!(Unit::parse("Stück"), Unit::Piece);
        assert_eq!(Unit::parse("stk"), Unit::Piece);
        assert_eq!(Unit::parse("EL"), Unit::Other("el".to_string()));
    }

    #[test]
    fn test_identity_conversion() {
        assert_eq!(convert(3.5, "kg", "KG"), Some(3.5));
        assert_eq!(convert(2.0, "Stück", "Stk"), Some(2.0));
        assert_eq!(convert(1.0, "Bund", " bund "), Some(1.0));
    }

    #[test]
    fn test_mass_conversion() {
        assert_eq!(convert(500.0, "g", "kg"), Some(0.5));
        assert_eq!(convert(1.5, "kg", "g"), Some(1500.0));
    }

    #[test]
    fn test_volume_conversion() {
        assert_eq!(convert(250.0, "ml", "l"), Some(0.25));
        assert_eq!(convert(2.0, "l", "ml"), Some(2000.0));
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let pairs = [("g", "kg"), ("kg", "g"), ("ml", "l"), ("l", "ml")];
        for x in [0.001, 1.0, 333.3, 12345.678] {
            for (a, b) in pairs {
                let there = convert(x, a, b).unwrap();
                let back = convert(there, b, a).unwrap();
                assert!((back - x).abs() < EPSILON * x.max(1.0), "{x} {a}->{b}->{a} = {back}");
            }
        }
    }

    #[test]
    fn test_unconvertible_pairs() {
        assert_eq!(convert(100.0, "g", "ml"), None);
        assert_eq!(convert(1.0, "l", "kg"), None);
        assert_eq!(convert(2.0, "Stück", "g"), None);
        assert_eq!(convert(1.0, "EL", "ml"), None);
        assert_eq!(convert(1.0, "Bund", "Stück"), None);
        assert_eq!(convert(1.0, "EL", "TL"), None);
    }

    #[test]
    fn test_unit_families() {
        assert!(Unit::Gram.is_weight());
        assert!(!Unit::Gram.is_volume());
        assert!(Unit::Liter.is_volume());
        assert!(Unit::Piece.is_count());
        assert_eq!(Unit::parse("prise").family(), UnitFamily::Other);
    }

    #[test]
    fn test_to_base_quantity() {
        assert_eq!(to_base_quantity(2.0, &Unit::Kilogram), 2000.0);
        assert_eq!(to_base_quantity(0.5, &Unit::Liter), 500.0);
        assert_eq!(to_base_quantity(3.0, &Unit::Piece), 3.0);
        assert_eq!(to_base_quantity(4.0, &Unit::parse("Dose")), 4.0);
    }
}
