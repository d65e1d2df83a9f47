// src/storage/catalog.rs

//! Catalog queries used by the reconciliation layer.
//!
//! Every function takes the open connection (in practice the run
//! transaction, which derefs to it) explicitly; nothing here owns
//! connection state.

use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::error::Result;
use crate::models::{CATEGORIES, TeaRecord, VendorInfo};

/// A new tea queued for batch insertion at the end of a run.
#[derive(Debug, Clone)]
pub struct NewTea {
    pub vendor_id: i64,
    pub slug: String,
    pub record: TeaRecord,
    pub category_ids: Vec<i64>,
}

/// Get or create the row for a vendor, returning its id.
pub fn ensure_vendor(conn: &Connection, vendor: &VendorInfo) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM vendors WHERE slug = ?1",
            params![vendor.slug],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO vendors (name, slug, description, link, logo, display_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            vendor.name,
            vendor.slug,
            vendor.description,
            vendor.link,
            vendor.logo,
            vendor.display_order
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get or create every taxonomy row, returning slug -> id.
pub fn ensure_categories(conn: &Connection) -> Result<HashMap<&'static str, i64>> {
    let mut ids = HashMap::new();

    for (order, category) in CATEGORIES.iter().enumerate() {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM categories WHERE slug = ?1",
                params![category.slug],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO categories (name, slug, is_origin, display_order)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![category.name, category.slug, category.is_origin, order as i64],
                )?;
                conn.last_insert_rowid()
            }
        };
        ids.insert(category.slug, id);
    }

    Ok(ids)
}

/// Load every slug already assigned, grouped by vendor.
pub fn load_used_slugs(conn: &Connection) -> Result<HashMap<i64, HashSet<String>>> {
    let mut stmt = conn.prepare("SELECT vendor_id, slug FROM teas")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut used: HashMap<i64, HashSet<String>> = HashMap::new();
    for row in rows {
        let (vendor_id, slug) = row?;
        used.entry(vendor_id).or_default().insert(slug);
    }
    Ok(used)
}

/// Update the tea matched by `(vendor, vendor_internal_id)`.
///
/// All scraped fields are set and the soft-delete flag is cleared. When the
/// record carries no illustration the stored one is left untouched; an
/// explicit empty string clears it. Returns the number of matched rows.
pub fn update_tea(
    conn: &Connection,
    vendor_id: i64,
    record: &TeaRecord,
    now: &str,
) -> Result<usize> {
    let b = &record.brewing;

    let changed = match &record.illustration {
        Some(value) => {
            let illustration = (!value.is_empty()).then_some(value.as_str());
            conn.execute(
                "UPDATE teas SET name = ?1, description = ?2, long_description = ?3,
                        ingredients = ?4, tips_raw = ?5, tips_mass = ?6, tips_volume = ?7,
                        tips_temperature = ?8, tips_duration = ?9, tips_extra = ?10,
                        tips_max_brews = ?11, price = ?12, price_unit = ?13, link = ?14,
                        updated_at = ?15, deleted_at = NULL, illustration = ?16
                 WHERE vendor_id = ?17 AND vendor_internal_id = ?18",
                params![
                    record.name,
                    record.description,
                    record.long_description,
                    record.ingredients,
                    b.raw,
                    b.mass_mg,
                    b.volume_cl,
                    b.temperature_c,
                    b.duration_secs,
                    b.extra,
                    b.max_brews,
                    record.price,
                    record.price_unit,
                    record.link,
                    now,
                    illustration,
                    vendor_id,
                    record.vendor_internal_id
                ],
            )?
        }
        None => conn.execute(
            "UPDATE teas SET name = ?1, description = ?2, long_description = ?3,
                    ingredients = ?4, tips_raw = ?5, tips_mass = ?6, tips_volume = ?7,
                    tips_temperature = ?8, tips_duration = ?9, tips_extra = ?10,
                    tips_max_brews = ?11, price = ?12, price_unit = ?13, link = ?14,
                    updated_at = ?15, deleted_at = NULL
             WHERE vendor_id = ?16 AND vendor_internal_id = ?17",
            params![
                record.name,
                record.description,
                record.long_description,
                record.ingredients,
                b.raw,
                b.mass_mg,
                b.volume_cl,
                b.temperature_c,
                b.duration_secs,
                b.extra,
                b.max_brews,
                record.price,
                record.price_unit,
                record.link,
                now,
                vendor_id,
                record.vendor_internal_id
            ],
        )?,
    };

    Ok(changed)
}

/// Resolve a tea's row id by its join key.
pub fn tea_id_by_join_key(
    conn: &Connection,
    vendor_id: i64,
    vendor_internal_id: &str,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM teas WHERE vendor_id = ?1 AND vendor_internal_id = ?2",
            params![vendor_id, vendor_internal_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Batch-insert queued teas.
///
/// The batch splits into records with an illustration key and records
/// without one, so each prepared statement keeps a uniform column set and
/// the illustration-less group falls back to the column default.
pub fn insert_teas(conn: &Connection, teas: &[NewTea], now: &str) -> Result<usize> {
    let with_illustration: Vec<&NewTea> = teas
        .iter()
        .filter(|t| t.record.illustration.is_some())
        .collect();
    let without_illustration: Vec<&NewTea> = teas
        .iter()
        .filter(|t| t.record.illustration.is_none())
        .collect();

    if !with_illustration.is_empty() {
        let mut stmt = conn.prepare(
            "INSERT INTO teas (vendor_id, vendor_internal_id, name, slug, description,
                    long_description, ingredients, tips_raw, tips_mass, tips_volume,
                    tips_temperature, tips_duration, tips_extra, tips_max_brews,
                    price, price_unit, link, updated_at, illustration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19)",
        )?;
        for tea in &with_illustration {
            let record = &tea.record;
            let b = &record.brewing;
            let illustration = record
                .illustration
                .as_deref()
                .filter(|s| !s.is_empty());
            stmt.execute(params![
                tea.vendor_id,
                record.vendor_internal_id,
                record.name,
                tea.slug,
                record.description,
                record.long_description,
                record.ingredients,
                b.raw,
                b.mass_mg,
                b.volume_cl,
                b.temperature_c,
                b.duration_secs,
                b.extra,
                b.max_brews,
                record.price,
                record.price_unit,
                record.link,
                now,
                illustration
            ])?;
        }
    }

    if !without_illustration.is_empty() {
        let mut stmt = conn.prepare(
            "INSERT INTO teas (vendor_id, vendor_internal_id, name, slug, description,
                    long_description, ingredients, tips_raw, tips_mass, tips_volume,
                    tips_temperature, tips_duration, tips_extra, tips_max_brews,
                    price, price_unit, link, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18)",
        )?;
        for tea in &without_illustration {
            let record = &tea.record;
            let b = &record.brewing;
            stmt.execute(params![
                tea.vendor_id,
                record.vendor_internal_id,
                record.name,
                tea.slug,
                record.description,
                record.long_description,
                record.ingredients,
                b.raw,
                b.mass_mg,
                b.volume_cl,
                b.temperature_c,
                b.duration_secs,
                b.extra,
                b.max_brews,
                record.price,
                record.price_unit,
                record.link,
                now
            ])?;
        }
    }

    Ok(teas.len())
}

/// Insert the category rows for freshly inserted teas, re-resolving each
/// tea's id by join key now that the rows exist.
pub fn insert_tea_categories(conn: &Connection, teas: &[NewTea]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO tea_categories (tea_id, category_id) VALUES (?1, ?2)")?;

    for tea in teas {
        let Some(tea_id) = tea_id_by_join_key(conn, tea.vendor_id, &tea.record.vendor_internal_id)?
        else {
            continue;
        };
        for category_id in &tea.category_ids {
            stmt.execute(params![tea_id, category_id])?;
        }
    }
    Ok(())
}

/// Replace a tea's category associations with the given set.
pub fn replace_tea_categories(conn: &Connection, tea_id: i64, category_ids: &[i64]) -> Result<()> {
    conn.execute(
        "DELETE FROM tea_categories WHERE tea_id = ?1",
        params![tea_id],
    )?;

    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO tea_categories (tea_id, category_id) VALUES (?1, ?2)")?;
    for category_id in category_ids {
        stmt.execute(params![tea_id, category_id])?;
    }
    Ok(())
}

/// Flag the vendor's still-active teas missing from `retrieved` as deleted.
///
/// Already-flagged rows keep their original deletion timestamp, so running
/// the same import twice stamps nothing the second time.
pub fn soft_delete_missing(
    conn: &Connection,
    vendor_id: i64,
    retrieved: &[String],
    now: &str,
) -> Result<usize> {
    if retrieved.is_empty() {
        let flagged = conn.execute(
            "UPDATE teas SET deleted_at = ?1 WHERE vendor_id = ?2 AND deleted_at IS NULL",
            params![now, vendor_id],
        )?;
        return Ok(flagged);
    }

    let placeholders = vec!["?"; retrieved.len()].join(", ");
    let sql = format!(
        "UPDATE teas SET deleted_at = ?1
         WHERE vendor_id = ?2 AND deleted_at IS NULL
           AND vendor_internal_id NOT IN ({placeholders})"
    );

    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(retrieved.len() + 2);
    values.push(&now);
    values.push(&vendor_id);
    for id in retrieved {
        values.push(id);
    }

    Ok(conn.execute(&sql, values.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrewingHints, CATEGORIES};
    use crate::storage::Catalog;

    fn vendor() -> VendorInfo {
        VendorInfo {
            name: "Test Vendor".to_string(),
            slug: "test".to_string(),
            description: "A vendor".to_string(),
            link: "https://vendor.example".to_string(),
            logo: None,
            display_order: 1,
        }
    }

    fn record(id: &str, name: &str) -> TeaRecord {
        TeaRecord {
            vendor_internal_id: id.to_string(),
            name: name.to_string(),
            description: Some("desc".to_string()),
            long_description: None,
            ingredients: None,
            brewing: BrewingHints::default(),
            illustration: None,
            price: None,
            price_unit: None,
            link: format!("https://vendor.example/{id}"),
        }
    }

    #[test]
    fn ensure_vendor_is_idempotent() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let tx = catalog.transaction().unwrap();

        let first = ensure_vendor(&tx, &vendor()).unwrap();
        let second = ensure_vendor(&tx, &vendor()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ensure_categories_creates_full_table_once() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let tx = catalog.transaction().unwrap();

        let first = ensure_categories(&tx).unwrap();
        let second = ensure_categories(&tx).unwrap();
        assert_eq!(first.len(), CATEGORIES.len());
        assert_eq!(first, second);

        let count: i64 = tx
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count as usize, CATEGORIES.len());
    }

    #[test]
    fn update_returns_zero_for_unknown_join_key() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let tx = catalog.transaction().unwrap();
        let vendor_id = ensure_vendor(&tx, &vendor()).unwrap();

        let changed = update_tea(&tx, vendor_id, &record("42", "Sencha"), "2026-01-01").unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn insert_partitions_by_illustration_key() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let tx = catalog.transaction().unwrap();
        let vendor_id = ensure_vendor(&tx, &vendor()).unwrap();

        let mut with = record("1", "Sencha");
        with.illustration = Some("https://img/1.jpg".to_string());
        let without = record("2", "Bancha");

        let teas = vec![
            NewTea {
                vendor_id,
                slug: "sencha".to_string(),
                record: with,
                category_ids: vec![],
            },
            NewTea {
                vendor_id,
                slug: "bancha".to_string(),
                record: without,
                category_ids: vec![],
            },
        ];
        assert_eq!(insert_teas(&tx, &teas, "2026-01-01").unwrap(), 2);

        let stored: Option<String> = tx
            .query_row(
                "SELECT illustration FROM teas WHERE vendor_internal_id = '1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored.as_deref(), Some("https://img/1.jpg"));

        let stored: Option<String> = tx
            .query_row(
                "SELECT illustration FROM teas WHERE vendor_internal_id = '2'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, None);
    }

    #[test]
    fn soft_delete_skips_retrieved_and_already_deleted() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let tx = catalog.transaction().unwrap();
        let vendor_id = ensure_vendor(&tx, &vendor()).unwrap();

        let teas: Vec<NewTea> = ["a", "b", "c"]
            .iter()
            .map(|id| NewTea {
                vendor_id,
                slug: format!("tea-{id}"),
                record: record(id, "Tea"),
                category_ids: vec![],
            })
            .collect();
        insert_teas(&tx, &teas, "2026-01-01").unwrap();

        let retrieved = vec!["a".to_string(), "c".to_string()];
        let flagged = soft_delete_missing(&tx, vendor_id, &retrieved, "2026-02-01").unwrap();
        assert_eq!(flagged, 1);

        // Second pass with the same retrieved set flags nothing new
        let flagged = soft_delete_missing(&tx, vendor_id, &retrieved, "2026-03-01").unwrap();
        assert_eq!(flagged, 0);

        let deleted_at: Option<String> = tx
            .query_row(
                "SELECT deleted_at FROM teas WHERE vendor_internal_id = 'b'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(deleted_at.as_deref(), Some("2026-02-01"));
    }
}
