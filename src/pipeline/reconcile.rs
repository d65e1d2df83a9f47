// src/pipeline/reconcile.rs

//! Reconciliation of scraped records against the stored catalog.
//!
//! Consumes the interleaved stream of records coming out of the importers
//! and turns it into updates, queued batch inserts, category replacements
//! and a final soft-delete pass, all inside the single run transaction the
//! caller owns.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::{CategoryDef, TeaRecord, VendorInfo};
use crate::storage::catalog::{self, NewTea};
use crate::utils::slug::{slugify, unique_slug};
use crate::utils::text::title_case;

/// Reconciliation state for one import run.
///
/// Borrows the run transaction; committing or rolling back stays with the
/// caller. The per-vendor used-slug sets are seeded from the database once,
/// at construction, so new teas allocated within the same run cannot
/// collide with each other either.
pub struct Reconciler<'conn> {
    conn: &'conn Connection,
    category_ids: HashMap<&'static str, i64>,
    used_slugs: HashMap<i64, HashSet<String>>,
    pending: Vec<NewTea>,
    now: String,
    inserted: usize,
    updated: usize,
}

impl<'conn> Reconciler<'conn> {
    /// Seed reconciliation state from the catalog.
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        let category_ids = catalog::ensure_categories(conn)?;
        let used_slugs = catalog::load_used_slugs(conn)?;

        Ok(Self {
            conn,
            category_ids,
            used_slugs,
            pending: Vec::new(),
            now: Utc::now().to_rfc3339(),
            inserted: 0,
            updated: 0,
        })
    }

    /// Get or create the catalog row for a vendor.
    pub fn ensure_vendor(&self, vendor: &VendorInfo) -> Result<i64> {
        catalog::ensure_vendor(self.conn, vendor)
    }

    /// Reconcile one scraped record.
    pub fn ingest(
        &mut self,
        vendor_id: i64,
        mut record: TeaRecord,
        categories: &[&'static CategoryDef],
    ) -> Result<()> {
        record.name = title_case(&record.name);

        let category_ids: Vec<i64> = categories
            .iter()
            .filter_map(|c| self.category_ids.get(c.slug).copied())
            .collect();

        let matched = catalog::update_tea(self.conn, vendor_id, &record, &self.now)?;

        if matched == 0 {
            // A zero-row update can also mean "update with identical
            // values" on some stores, so new-ness is decided by an explicit
            // existence check on the join key.
            let exists =
                catalog::tea_id_by_join_key(self.conn, vendor_id, &record.vendor_internal_id)?
                    .is_some();

            if !exists {
                let used = self.used_slugs.entry(vendor_id).or_default();
                let slug = unique_slug(&slugify(&record.name), used);
                used.insert(slug.clone());

                self.pending.push(NewTea {
                    vendor_id,
                    slug,
                    record,
                    category_ids,
                });
                self.inserted += 1;
                return Ok(());
            }
        } else {
            self.updated += 1;
        }

        // Updated or unchanged: category associations are a full replace
        if let Some(tea_id) =
            catalog::tea_id_by_join_key(self.conn, vendor_id, &record.vendor_internal_id)?
        {
            catalog::replace_tea_categories(self.conn, tea_id, &category_ids)?;
        }
        Ok(())
    }

    /// Batch-insert everything queued by [`ingest`](Self::ingest), then
    /// attach the new teas' categories.
    pub fn flush_inserts(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let count = catalog::insert_teas(self.conn, &self.pending, &self.now)?;
        catalog::insert_tea_categories(self.conn, &self.pending)?;
        self.pending.clear();
        Ok(count)
    }

    /// Flag the vendor's teas absent from `retrieved` as deleted.
    pub fn soft_delete_missing(&self, vendor_id: i64, retrieved: &[String]) -> Result<usize> {
        catalog::soft_delete_missing(self.conn, vendor_id, retrieved, &self.now)
    }

    /// New teas queued or inserted so far this run.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Existing teas touched by an update so far this run.
    pub fn updated(&self) -> usize {
        self.updated
    }
}
