//! # Meal Deal Pricing
//!
//! Prices dishes from their recipes against weekly supermarket offers.
//! A user's postal code selects the advertising regions whose offers apply;
//! each recipe line is priced at its reference price and at the cheapest
//! active offer, and the lines are summed into a dish price with savings.

pub mod aggregator;
pub mod chain_filter;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod line_pricer;
pub mod listing;
pub mod logging;
pub mod model;
pub mod offers;
pub mod regions;
pub mod service;
pub mod store;
pub mod units;
