//! # PostgreSQL Reference Store
//!
//! Schema setup, seeding upserts, favorites, saved postal codes and the
//! read queries behind [`PgStore`], the PostgreSQL implementation of
//! [`ReferenceStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;

use crate::config::DatabaseConfig;
use crate::model::{
    Chain, ChainId, Dish, Ingredient, Offer, OfferId, PostalCodeMapping, RecipeLine, Region,
    RegionId,
};
use crate::regions::normalize_postal_code;
use crate::store::{DishQuery, ReferenceStore};

/// Open a connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        "Connecting to database (max {} connections)",
        config.max_connections
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chains (
            chain_id BIGINT PRIMARY KEY,
            chain_name TEXT NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create chains table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ad_regions (
            region_id BIGINT PRIMARY KEY,
            chain_id BIGINT NOT NULL REFERENCES chains(chain_id),
            label TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create ad_regions table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS postal_codes (
            plz TEXT NOT NULL,
            region_id BIGINT NOT NULL REFERENCES ad_regions(region_id),
            PRIMARY KEY (plz, region_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create postal_codes table")?;

    sqlx::query("CREATE TABLE IF NOT EXISTS categories (category TEXT PRIMARY KEY)")
        .execute(pool)
        .await
        .context("Failed to create categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ingredients (
            ingredient_id TEXT PRIMARY KEY,
            name_canonical TEXT NOT NULL,
            unit_default TEXT NOT NULL,
            price_baseline_per_unit DOUBLE PRECISION CHECK (price_baseline_per_unit >= 0),
            allergen_tags TEXT[],
            notes TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create ingredients table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dishes (
            dish_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            is_quick BOOLEAN NOT NULL DEFAULT FALSE,
            is_meal_prep BOOLEAN NOT NULL DEFAULT FALSE,
            season TEXT,
            cuisine TEXT,
            notes TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create dishes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dish_ingredients (
            dish_id TEXT NOT NULL REFERENCES dishes(dish_id) ON DELETE CASCADE,
            ingredient_id TEXT NOT NULL REFERENCES ingredients(ingredient_id),
            qty DOUBLE PRECISION NOT NULL CHECK (qty > 0),
            unit TEXT NOT NULL,
            optional BOOLEAN NOT NULL DEFAULT FALSE,
            role TEXT,
            PRIMARY KEY (dish_id, ingredient_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create dish_ingredients table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS offers (
            offer_id BIGSERIAL PRIMARY KEY,
            region_id BIGINT NOT NULL REFERENCES ad_regions(region_id),
            ingredient_id TEXT NOT NULL REFERENCES ingredients(ingredient_id),
            price_total DOUBLE PRECISION NOT NULL CHECK (price_total >= 0),
            pack_size DOUBLE PRECISION NOT NULL CHECK (pack_size > 0),
            unit_base TEXT NOT NULL,
            valid_from DATE NOT NULL,
            valid_to DATE NOT NULL,
            source TEXT,
            source_ref_id TEXT,
            offer_hash TEXT NOT NULL UNIQUE,
            CHECK (valid_from <= valid_to)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create offers table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS offers_lookup_idx
         ON offers (ingredient_id, region_id, valid_from, valid_to)",
    )
    .execute(pool)
    .await
    .context("Failed to create offers lookup index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS favorites (
            user_id TEXT NOT NULL,
            dish_id TEXT NOT NULL REFERENCES dishes(dish_id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, dish_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create favorites table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            plz TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_profiles table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

pub async fn upsert_chain(pool: &PgPool, chain: &Chain) -> Result<()> {
    sqlx::query(
        "INSERT INTO chains (chain_id, chain_name) VALUES ($1, $2)
         ON CONFLICT (chain_id) DO UPDATE SET chain_name = EXCLUDED.chain_name",
    )
    .bind(chain.chain_id)
    .bind(&chain.chain_name)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to upsert chain {}", chain.chain_id))?;
    Ok(())
}

pub async fn upsert_category(pool: &PgPool, category: &str) -> Result<()> {
    sqlx::query("INSERT INTO categories (category) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(category)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to upsert category {category}"))?;
    Ok(())
}

pub async fn upsert_region(pool: &PgPool, region: &Region) -> Result<()> {
    sqlx::query(
        "INSERT INTO ad_regions (region_id, chain_id, label) VALUES ($1, $2, $3)
         ON CONFLICT (region_id) DO UPDATE
         SET chain_id = EXCLUDED.chain_id, label = EXCLUDED.label",
    )
    .bind(region.region_id)
    .bind(region.chain_id)
    .bind(&region.label)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to upsert region {}", region.region_id))?;
    Ok(())
}

pub async fn insert_postal_code(pool: &PgPool, mapping: &PostalCodeMapping) -> Result<()> {
    sqlx::query(
        "INSERT INTO postal_codes (plz, region_id) VALUES ($1, $2)
         ON CONFLICT (plz, region_id) DO NOTHING",
    )
    .bind(&mapping.plz)
    .bind(mapping.region_id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to insert postal code {}", mapping.plz))?;
    Ok(())
}

pub async fn upsert_ingredient(pool: &PgPool, ingredient: &Ingredient) -> Result<()> {
    let allergens = (!ingredient.allergen_tags.is_empty()).then(|| ingredient.allergen_tags.clone());

    sqlx::query(
        "INSERT INTO ingredients
            (ingredient_id, name_canonical, unit_default, price_baseline_per_unit, allergen_tags, notes)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (ingredient_id) DO UPDATE SET
            name_canonical = EXCLUDED.name_canonical,
            unit_default = EXCLUDED.unit_default,
            price_baseline_per_unit = EXCLUDED.price_baseline_per_unit,
            allergen_tags = EXCLUDED.allergen_tags,
            notes = EXCLUDED.notes",
    )
    .bind(&ingredient.ingredient_id)
    .bind(&ingredient.name_canonical)
    .bind(&ingredient.unit_default)
    .bind(ingredient.price_baseline_per_unit)
    .bind(allergens)
    .bind(&ingredient.notes)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to upsert ingredient {}", ingredient.ingredient_id))?;
    Ok(())
}

pub async fn upsert_dish(pool: &PgPool, dish: &Dish) -> Result<()> {
    sqlx::query(
        "INSERT INTO dishes
            (dish_id, name, category, is_quick, is_meal_prep, season, cuisine, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (dish_id) DO UPDATE SET
            name = EXCLUDED.name,
            category = EXCLUDED.category,
            is_quick = EXCLUDED.is_quick,
            is_meal_prep = EXCLUDED.is_meal_prep,
            season = EXCLUDED.season,
            cuisine = EXCLUDED.cuisine,
            notes = EXCLUDED.notes",
    )
    .bind(&dish.dish_id)
    .bind(&dish.name)
    .bind(&dish.category)
    .bind(dish.is_quick)
    .bind(dish.is_meal_prep)
    .bind(&dish.season)
    .bind(&dish.cuisine)
    .bind(&dish.notes)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to upsert dish {}", dish.dish_id))?;
    Ok(())
}

pub async fn upsert_recipe_line(pool: &PgPool, line: &RecipeLine) -> Result<()> {
    sqlx::query(
        "INSERT INTO dish_ingredients (dish_id, ingredient_id, qty, unit, optional, role)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (dish_id, ingredient_id) DO UPDATE SET
            qty = EXCLUDED.qty,
            unit = EXCLUDED.unit,
            optional = EXCLUDED.optional,
            role = EXCLUDED.role",
    )
    .bind(&line.dish_id)
    .bind(&line.ingredient_id)
    .bind(line.qty)
    .bind(&line.unit)
    .bind(line.optional)
    .bind(&line.role)
    .execute(pool)
    .await
    .with_context(|| {
        format!(
            "Failed to upsert recipe line {}/{}",
            line.dish_id, line.ingredient_id
        )
    })?;
    Ok(())
}

/// Insert an offer, deduplicated on [`Offer::dedup_hash`]
///
/// The `offer_id` of the argument is ignored; the stored offer's id is
/// returned. Re-inserting an identical offer returns the existing id.
pub async fn upsert_offer(pool: &PgPool, offer: &Offer) -> Result<OfferId> {
    let hash = offer.dedup_hash();

    let offer_id: i64 = sqlx::query_scalar(
        "INSERT INTO offers
            (region_id, ingredient_id, price_total, pack_size, unit_base,
             valid_from, valid_to, source, source_ref_id, offer_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (offer_hash) DO UPDATE SET
            unit_base = EXCLUDED.unit_base,
            source = EXCLUDED.source
         RETURNING offer_id",
    )
    .bind(offer.region_id)
    .bind(&offer.ingredient_id)
    .bind(offer.price_total)
    .bind(offer.pack_size)
    .bind(&offer.unit_base)
    .bind(offer.valid_from)
    .bind(offer.valid_to)
    .bind(&offer.source)
    .bind(&offer.source_ref_id)
    .bind(&hash)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to upsert offer {hash}"))?;

    debug!("Stored offer {hash} as #{offer_id}");
    Ok(offer_id)
}

// ---------------------------------------------------------------------------
// User profiles
// ---------------------------------------------------------------------------

/// Postal code saved for a user, if any
pub async fn get_user_plz(pool: &PgPool, user_id: &str) -> Result<Option<String>> {
    let plz: Option<Option<String>> =
        sqlx::query_scalar("SELECT plz FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("Failed to fetch user postal code")?;

    Ok(plz.flatten())
}

/// Save a user's postal code; a blank one clears it
///
/// Malformed postal codes are rejected before anything is written.
pub async fn update_user_plz(pool: &PgPool, user_id: &str, plz: &str) -> Result<()> {
    let plz = normalize_postal_code(Some(plz))?;

    sqlx::query(
        "INSERT INTO user_profiles (user_id, plz, updated_at) VALUES ($1, $2, NOW())
         ON CONFLICT (user_id) DO UPDATE SET plz = EXCLUDED.plz, updated_at = NOW()",
    )
    .bind(user_id)
    .bind(&plz)
    .execute(pool)
    .await
    .context("Failed to update user postal code")?;

    info!("Saved postal code {:?} for user {user_id}", plz);
    Ok(())
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

pub async fn get_favorites(pool: &PgPool, user_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT dish_id FROM favorites WHERE user_id = $1 ORDER BY dish_id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch favorites")
}

/// Add a favorite; returns `false` if it already existed
pub async fn add_favorite(pool: &PgPool, user_id: &str, dish_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO favorites (user_id, dish_id) VALUES ($1, $2)
         ON CONFLICT (user_id, dish_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(dish_id)
    .execute(pool)
    .await
    .context("Failed to add favorite")?;

    Ok(result.rows_affected() > 0)
}

/// Remove a favorite; returns `false` if there was none
pub async fn remove_favorite(pool: &PgPool, user_id: &str, dish_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND dish_id = $2")
        .bind(user_id)
        .bind(dish_id)
        .execute(pool)
        .await
        .context("Failed to remove favorite")?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_favorite(pool: &PgPool, user_id: &str, dish_id: &str) -> Result<bool> {
    let found: Option<bool> = sqlx::query_scalar(
        "SELECT TRUE FROM favorites WHERE user_id = $1 AND dish_id = $2",
    )
    .bind(user_id)
    .bind(dish_id)
    .fetch_optional(pool)
    .await
    .context("Failed to check favorite")?;

    Ok(found.unwrap_or(false))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn dish_from_row(row: &PgRow) -> Result<Dish, sqlx::Error> {
    Ok(Dish {
        dish_id: row.try_get("dish_id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        is_quick: row.try_get("is_quick")?,
        is_meal_prep: row.try_get("is_meal_prep")?,
        season: row.try_get("season")?,
        cuisine: row.try_get("cuisine")?,
        notes: row.try_get("notes")?,
    })
}

fn offer_from_row(row: &PgRow) -> Result<Offer, sqlx::Error> {
    Ok(Offer {
        offer_id: row.try_get("offer_id")?,
        region_id: row.try_get("region_id")?,
        ingredient_id: row.try_get("ingredient_id")?,
        price_total: row.try_get("price_total")?,
        pack_size: row.try_get("pack_size")?,
        unit_base: row.try_get("unit_base")?,
        valid_from: row.try_get("valid_from")?,
        valid_to: row.try_get("valid_to")?,
        source: row.try_get("source")?,
        source_ref_id: row.try_get("source_ref_id")?,
    })
}

const DISH_COLUMNS: &str = "dish_id, name, category, is_quick, is_meal_prep, season, cuisine, notes";

pub async fn get_dish(pool: &PgPool, dish_id: &str) -> Result<Option<Dish>> {
    let row = sqlx::query(&format!("SELECT {DISH_COLUMNS} FROM dishes WHERE dish_id = $1"))
        .bind(dish_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read dish")?;

    row.as_ref()
        .map(dish_from_row)
        .transpose()
        .context("Failed to decode dish")
}

pub async fn list_dishes(pool: &PgPool, query: &DishQuery) -> Result<Vec<Dish>> {
    let rows = sqlx::query(&format!(
        "SELECT {DISH_COLUMNS} FROM dishes
         WHERE ($1::TEXT IS NULL OR category = $1)
           AND ($2::BOOLEAN IS NULL OR is_quick = $2)
           AND ($3::BOOLEAN IS NULL OR is_meal_prep = $3)
         ORDER BY dish_id
         LIMIT $4"
    ))
    .bind(&query.category)
    .bind(query.is_quick)
    .bind(query.is_meal_prep)
    .bind(query.limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to list dishes")?;

    rows.iter()
        .map(dish_from_row)
        .collect::<Result<_, _>>()
        .context("Failed to decode dishes")
}

pub async fn get_recipe_lines(pool: &PgPool, dish_id: &str) -> Result<Vec<RecipeLine>> {
    let rows = sqlx::query(
        "SELECT dish_id, ingredient_id, qty, unit, optional, role
         FROM dish_ingredients WHERE dish_id = $1 ORDER BY ingredient_id",
    )
    .bind(dish_id)
    .fetch_all(pool)
    .await
    .context("Failed to read recipe lines")?;

    rows.iter()
        .map(|row| {
            Ok(RecipeLine {
                dish_id: row.try_get("dish_id")?,
                ingredient_id: row.try_get("ingredient_id")?,
                qty: row.try_get("qty")?,
                unit: row.try_get("unit")?,
                optional: row.try_get("optional")?,
                role: row.try_get("role")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()
        .context("Failed to decode recipe lines")
}

pub async fn get_ingredient(pool: &PgPool, ingredient_id: &str) -> Result<Option<Ingredient>> {
    let row = sqlx::query(
        "SELECT ingredient_id, name_canonical, unit_default, price_baseline_per_unit,
                allergen_tags, notes
         FROM ingredients WHERE ingredient_id = $1",
    )
    .bind(ingredient_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read ingredient")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let allergen_tags: Option<Vec<String>> = row.try_get("allergen_tags")?;
    Ok(Some(Ingredient {
        ingredient_id: row.try_get("ingredient_id")?,
        name_canonical: row.try_get("name_canonical")?,
        unit_default: row.try_get("unit_default")?,
        price_baseline_per_unit: row.try_get("price_baseline_per_unit")?,
        allergen_tags: allergen_tags.unwrap_or_default(),
        notes: row.try_get("notes")?,
    }))
}

pub async fn get_active_offers(
    pool: &PgPool,
    ingredient_id: &str,
    region_ids: &BTreeSet<RegionId>,
    as_of: NaiveDate,
) -> Result<Vec<Offer>> {
    if region_ids.is_empty() {
        return Ok(Vec::new());
    }

    let regions: Vec<i64> = region_ids.iter().copied().collect();
    let rows = sqlx::query(
        "SELECT offer_id, region_id, ingredient_id, price_total, pack_size, unit_base,
                valid_from, valid_to, source, source_ref_id
         FROM offers
         WHERE ingredient_id = $1
           AND region_id = ANY($2)
           AND valid_from <= $3
           AND valid_to >= $3
         ORDER BY offer_id",
    )
    .bind(ingredient_id)
    .bind(&regions)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("Failed to fetch offers")?;

    rows.iter()
        .map(offer_from_row)
        .collect::<Result<_, _>>()
        .context("Failed to decode offers")
}

pub async fn regions_for_postal_code(pool: &PgPool, plz: &str) -> Result<Vec<RegionId>> {
    sqlx::query_scalar("SELECT region_id FROM postal_codes WHERE plz = $1 ORDER BY region_id")
        .bind(plz)
        .fetch_all(pool)
        .await
        .context("Failed to resolve postal code")
}

pub async fn regions_for_chain(pool: &PgPool, chain_id: ChainId) -> Result<Vec<RegionId>> {
    sqlx::query_scalar("SELECT region_id FROM ad_regions WHERE chain_id = $1 ORDER BY region_id")
        .bind(chain_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch chain regions")
}

pub async fn get_chain_by_name(pool: &PgPool, chain_name: &str) -> Result<Option<Chain>> {
    let row = sqlx::query("SELECT chain_id, chain_name FROM chains WHERE chain_name = $1")
        .bind(chain_name)
        .fetch_optional(pool)
        .await
        .context("Failed to read chain")?;

    match row {
        Some(row) => Ok(Some(Chain {
            chain_id: row.try_get("chain_id")?,
            chain_name: row.try_get("chain_name")?,
        })),
        None => Ok(None),
    }
}

/// Dish categories for the filter bar, alphabetically
pub async fn get_categories(pool: &PgPool) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT category FROM categories ORDER BY category")
        .fetch_all(pool)
        .await
        .context("Failed to fetch categories")
}

/// All chains, ordered by name
pub async fn get_chains(pool: &PgPool) -> Result<Vec<Chain>> {
    let rows = sqlx::query("SELECT chain_id, chain_name FROM chains ORDER BY chain_name")
        .fetch_all(pool)
        .await
        .context("Failed to fetch chains")?;

    rows.iter()
        .map(|row| {
            Ok(Chain {
                chain_id: row.try_get("chain_id")?,
                chain_name: row.try_get("chain_name")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()
        .context("Failed to decode chains")
}

/// [`ReferenceStore`] backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn get_dish(&self, dish_id: &str) -> Result<Option<Dish>> {
        get_dish(&self.pool, dish_id).await
    }

    async fn list_dishes(&self, query: &DishQuery) -> Result<Vec<Dish>> {
        list_dishes(&self.pool, query).await
    }

    async fn get_recipe_lines(&self, dish_id: &str) -> Result<Vec<RecipeLine>> {
        get_recipe_lines(&self.pool, dish_id).await
    }

    async fn get_ingredient(&self, ingredient_id: &str) -> Result<Option<Ingredient>> {
        get_ingredient(&self.pool, ingredient_id).await
    }

    async fn get_active_offers(
        &self,
        ingredient_id: &str,
        region_ids: &BTreeSet<RegionId>,
        as_of: NaiveDate,
    ) -> Result<Vec<Offer>> {
        get_active_offers(&self.pool, ingredient_id, region_ids, as_of).await
    }

    async fn regions_for_postal_code(&self, plz: &str) -> Result<Vec<RegionId>> {
        regions_for_postal_code(&self.pool, plz).await
    }

    async fn regions_for_chain(&self, chain_id: ChainId) -> Result<Vec<RegionId>> {
        regions_for_chain(&self.pool, chain_id).await
    }

    async fn get_chain_by_name(&self, chain_name: &str) -> Result<Option<Chain>> {
        get_chain_by_name(&self.pool, chain_name).await
    }
}
