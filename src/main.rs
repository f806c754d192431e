use anyhow::Result;
use log::info;
use std::env;

use mealdeal::clock::{Clock, FixedClock, SystemClock};
use mealdeal::config::Config;
use mealdeal::db::{self, PgStore};
use mealdeal::listing::{DishFilters, SortOrder};
use mealdeal::logging::init_logging;
use mealdeal::service::PricingService;

const USAGE: &str = "usage: mealdeal <dish_id> [plz] | mealdeal list [plz]";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(&config.logging)?;

    info!("Starting meal deal pricing");

    let pool = db::connect(&config.database).await?;
    db::init_database_schema(&pool).await?;

    let today = config.pricing_date.unwrap_or_else(|| SystemClock.today());
    info!("Pricing as of {today}");

    let service = PricingService::new(PgStore::new(pool), FixedClock(today))
        .with_listing_limit(config.listing_limit);

    let args: Vec<String> = env::args().skip(1).collect();
    let output = match args.as_slice() {
        [] => list(&service, None).await?,
        [cmd] if cmd == "list" => list(&service, None).await?,
        [cmd, plz] if cmd == "list" => list(&service, Some(plz.as_str())).await?,
        [dish_id] => price(&service, dish_id, None).await?,
        [dish_id, plz] => price(&service, dish_id, Some(plz.as_str())).await?,
        _ => anyhow::bail!(USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn price(
    service: &PricingService<PgStore, FixedClock>,
    dish_id: &str,
    plz: Option<&str>,
) -> Result<serde_json::Value> {
    let pricing = service.price_dish(dish_id, plz).await?;
    let lines = service.price_dish_ingredients(dish_id, plz).await?;

    Ok(serde_json::json!({
        "pricing": pricing,
        "ingredients": lines,
    }))
}

async fn list(
    service: &PricingService<PgStore, FixedClock>,
    plz: Option<&str>,
) -> Result<serde_json::Value> {
    let filters = DishFilters {
        plz: plz.map(str::to_string),
        ..Default::default()
    };
    let listings = service.list_dishes(&filters, SortOrder::Price, &[]).await?;

    Ok(serde_json::to_value(listings)?)
}
