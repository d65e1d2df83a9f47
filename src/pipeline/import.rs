// src/pipeline/import.rs

//! Import run orchestration.
//!
//! Drives the selected importers through their phases in lock-step: every
//! importer finishes a phase before any moves to the next. The two
//! page-producing phases are consumed one element at a time in rotating
//! order across importers, so no importer is starved and a slow or
//! early-exhausted one never blocks the rest.

use std::collections::VecDeque;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, ImportSummary};
use crate::pipeline::reconcile::Reconciler;
use crate::storage::Catalog;
use crate::utils::http::FetchClient;
use crate::vendors::{self, VendorImporter};

/// Periodic progress logging for a counted phase.
struct Progress {
    label: &'static str,
    total: usize,
    done: usize,
    next_report: usize,
}

impl Progress {
    fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            done: 0,
            next_report: 1,
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        if self.done == self.next_report || self.done == self.total {
            log::info!("{}: {}/{}", self.label, self.done, self.total);
            self.next_report = self.done + (self.total / 10).max(1);
        }
    }
}

/// Resolve requested importer names against the registry.
///
/// The reserved name `all` activates every registered importer. Unknown
/// names are reported and skipped; an empty effective selection is an
/// error, raised before any network or database work.
fn resolve_selection(requested: &[String]) -> Result<Vec<&'static str>> {
    let registered = vendors::names();

    if requested.iter().any(|name| name == "all") {
        log::info!("Using all importers on request: {}", registered.join(", "));
        return Ok(registered.to_vec());
    }

    let mut active = Vec::new();
    let mut skipped = Vec::new();
    for name in requested {
        match registered.iter().find(|candidate| *candidate == name) {
            Some(found) => active.push(*found),
            None => skipped.push(name.as_str()),
        }
    }

    if !skipped.is_empty() {
        log::warn!("Skipping unknown importers: {}", skipped.join(", "));
    }

    if active.is_empty() {
        if requested.is_empty() {
            return Err(AppError::import(format!(
                "no importer specified; valid importers: {}",
                registered.join(", ")
            )));
        }
        return Err(AppError::import("no valid importer selected"));
    }

    Ok(active)
}

/// Run an import over the requested vendors.
///
/// Selection problems surface before the catalog is even opened, so a bad
/// invocation touches neither the network nor the database.
pub async fn run_import(
    config: &Config,
    db_path: &Path,
    requested: &[String],
    dry_run: bool,
) -> Result<ImportSummary> {
    let selection = resolve_selection(requested)?;

    let client = FetchClient::new(&config.fetch)?;
    let importers: Vec<Box<dyn VendorImporter>> = selection
        .iter()
        .filter_map(|name| vendors::create(name, &client))
        .collect();

    let mut catalog = Catalog::open(db_path)?;
    run_with_importers(&mut catalog, importers, dry_run).await
}

async fn run_with_importers(
    catalog: &mut Catalog,
    mut importers: Vec<Box<dyn VendorImporter>>,
    dry_run: bool,
) -> Result<ImportSummary> {
    let vendor_names: Vec<String> = importers
        .iter()
        .map(|imp| imp.vendor().name.clone())
        .collect();
    log::info!("Starting import from {}", vendor_names.join(", "));
    if dry_run {
        log::info!("Performing a dry run.");
    }

    // One transaction wraps the whole run; it is opened before any
    // importer work and released on every exit path below.
    let tx = catalog.transaction()?;
    let mut reconciler = Reconciler::new(&tx)?;

    let vendor_ids: Vec<i64> = importers
        .iter()
        .map(|imp| reconciler.ensure_vendor(imp.vendor()))
        .collect::<Result<_>>()?;

    let mut summary = ImportSummary::default();

    // Phase 1: plan reference pages; a failed importer drops out here
    let mut active: Vec<usize> = Vec::new();
    let mut reference_steps = 0;
    for (index, importer) in importers.iter_mut().enumerate() {
        match importer.prepare_references().await {
            Some(steps) => {
                reference_steps += steps;
                active.push(index);
            }
            None => log::warn!(
                "Reference pre-collection failed for {}",
                importer.vendor().name
            ),
        }
    }

    // Phase 2: collect references, one page per importer in rotation
    log::info!("Retrieving references ({reference_steps} pages)...");
    let mut progress = Progress::new("references", reference_steps);
    let mut rotation: VecDeque<usize> = active.iter().copied().collect();
    while let Some(index) = rotation.pop_front() {
        if importers[index].next_reference_page().await.is_some() {
            progress.tick();
            rotation.push_back(index);
        }
    }

    // Phase 3: deduplicate down to canonical links
    for &index in &active {
        let (found, errors) = importers[index].analyze_references();
        summary.references_count += found;
        summary.reference_errors.extend(errors);
    }
    log::info!(
        "{} references found, {} pages failed.",
        summary.references_count,
        summary.reference_errors.len()
    );
    for error in &summary.reference_errors {
        log::warn!("failed: {error}");
    }

    // Phase 4: crawl teas in the same rotation, feeding the reconciler
    let mut progress = Progress::new("teas", summary.references_count);
    let mut rotation: VecDeque<usize> = active.iter().copied().collect();
    while let Some(index) = rotation.pop_front() {
        if let Some((data, categories)) = importers[index].next_tea().await {
            progress.tick();
            if let Some(record) = data {
                reconciler.ingest(vendor_ids[index], record, &categories)?;
            }
            rotation.push_back(index);
        }
    }

    for &index in &active {
        summary
            .crawl_errors
            .extend(importers[index].crawl_errors().iter().cloned());
    }
    for error in &summary.crawl_errors {
        log::warn!("failed: {error}");
    }

    let flushed = reconciler.flush_inserts()?;
    if flushed > 0 {
        log::info!("Inserted {flushed} new teas.");
    }

    // Soft-delete pass, only for importers that completed the crawl
    for &index in &active {
        let retrieved = importers[index].retrieved_internal_ids().to_vec();
        let flagged = reconciler.soft_delete_missing(vendor_ids[index], &retrieved)?;
        if flagged > 0 {
            log::info!(
                "Flagged {flagged} vanished teas for {}.",
                importers[index].vendor().name
            );
        }
    }

    summary.inserted = reconciler.inserted();
    summary.updated = reconciler.updated();

    if dry_run {
        log::info!("Dry run: rolling back changes.");
        tx.rollback()?;
    } else {
        tx.commit()?;
    }

    log::info!(
        "Import finished: {} references, {} inserted, {} updated, {} item failures.",
        summary.references_count,
        summary.inserted,
        summary.updated,
        summary.crawl_errors.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::models::{BrewingHints, TeaRecord, VendorInfo};
    use crate::vendors::TeaYield;

    struct StubImporter {
        vendor: VendorInfo,
        prepare: Option<usize>,
        pages_left: usize,
        teas: VecDeque<TeaYield>,
        ids: Vec<String>,
        errors: Vec<String>,
        pull_log: Arc<Mutex<Vec<String>>>,
    }

    impl StubImporter {
        fn new(slug: &str, teas: Vec<TeaYield>, log: Arc<Mutex<Vec<String>>>) -> Self {
            let ids = teas
                .iter()
                .filter_map(|(record, _)| record.as_ref())
                .map(|r| r.vendor_internal_id.clone())
                .collect();
            Self {
                vendor: VendorInfo {
                    name: format!("Vendor {slug}"),
                    slug: slug.to_string(),
                    description: String::new(),
                    link: format!("https://{slug}.example"),
                    logo: None,
                    display_order: 0,
                },
                prepare: Some(1),
                pages_left: 1,
                teas: teas.into(),
                ids,
                errors: Vec::new(),
                pull_log: log,
            }
        }
    }

    #[async_trait]
    impl VendorImporter for StubImporter {
        fn vendor(&self) -> &VendorInfo {
            &self.vendor
        }

        async fn prepare_references(&mut self) -> Option<usize> {
            self.prepare
        }

        async fn next_reference_page(&mut self) -> Option<()> {
            if self.pages_left == 0 {
                return None;
            }
            self.pages_left -= 1;
            Some(())
        }

        fn analyze_references(&mut self) -> (usize, Vec<String>) {
            (self.teas.len(), Vec::new())
        }

        async fn next_tea(&mut self) -> Option<TeaYield> {
            let item = self.teas.pop_front()?;
            self.pull_log.lock().unwrap().push(self.vendor.slug.clone());
            Some(item)
        }

        fn crawl_errors(&self) -> &[String] {
            &self.errors
        }

        fn retrieved_internal_ids(&self) -> &[String] {
            &self.ids
        }
    }

    fn tea(id: &str, name: &str) -> TeaYield {
        (
            Some(TeaRecord {
                vendor_internal_id: id.to_string(),
                name: name.to_string(),
                description: None,
                long_description: None,
                ingredients: None,
                brewing: BrewingHints::default(),
                illustration: None,
                price: None,
                price_unit: None,
                link: format!("https://example/{id}"),
            }),
            Vec::new(),
        )
    }

    #[test]
    fn selection_resolves_all_wildcard() {
        let selection = resolve_selection(&["all".to_string()]).unwrap();
        assert_eq!(selection, vendors::names());
    }

    #[test]
    fn selection_skips_unknown_names() {
        let requested = vec!["mariage".to_string(), "harrods".to_string()];
        let selection = resolve_selection(&requested).unwrap();
        assert_eq!(selection, vec!["mariage"]);
    }

    #[test]
    fn selection_errors_when_nothing_usable() {
        assert!(resolve_selection(&[]).is_err());
        assert!(resolve_selection(&["harrods".to_string()]).is_err());
    }

    #[tokio::test]
    async fn interleaves_importers_fairly() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let x = StubImporter::new(
            "x",
            vec![
                tea("x1", "Tea X1"),
                tea("x2", "Tea X2"),
                tea("x3", "Tea X3"),
                tea("x4", "Tea X4"),
                tea("x5", "Tea X5"),
            ],
            Arc::clone(&log),
        );
        let y = StubImporter::new(
            "y",
            vec![tea("y1", "Tea Y1"), tea("y2", "Tea Y2")],
            Arc::clone(&log),
        );

        let mut catalog = Catalog::open_in_memory().unwrap();
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(x), Box::new(y)];
        let summary = run_with_importers(&mut catalog, importers, false)
            .await
            .unwrap();

        assert_eq!(summary.references_count, 7);
        assert_eq!(summary.inserted, 7);

        let order = log.lock().unwrap().clone();
        assert_eq!(order.len(), 7);
        // Both of y's pulls land within the first four: no starvation
        let y_positions: Vec<usize> = order
            .iter()
            .enumerate()
            .filter(|(_, slug)| *slug == "y")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(y_positions.len(), 2);
        assert!(y_positions.iter().all(|&p| p < 4), "order was {order:?}");
    }

    #[tokio::test]
    async fn prepare_failure_drops_importer_but_not_the_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut broken = StubImporter::new("broken", vec![tea("b1", "Tea B1")], Arc::clone(&log));
        broken.prepare = None;
        let healthy = StubImporter::new("healthy", vec![tea("h1", "Tea H1")], Arc::clone(&log));

        let mut catalog = Catalog::open_in_memory().unwrap();
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(broken), Box::new(healthy)];
        let summary = run_with_importers(&mut catalog, importers, false)
            .await
            .unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(log.lock().unwrap().as_slice(), ["healthy"]);

        // The dropped importer's vendor row exists but holds no teas and
        // was excluded from the soft-delete pass
        let tx = catalog.transaction().unwrap();
        let broken_teas: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM teas t JOIN vendors v ON v.id = t.vendor_id
                 WHERE v.slug = 'broken'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(broken_teas, 0);
    }

    #[tokio::test]
    async fn failed_items_count_toward_progress_but_not_the_catalog() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut imp = StubImporter::new(
            "x",
            vec![tea("x1", "Tea X1"), (None, Vec::new()), tea("x3", "Tea X3")],
            Arc::clone(&log),
        );
        imp.errors.push("https://x.example/x2".to_string());

        let mut catalog = Catalog::open_in_memory().unwrap();
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(imp)];
        let summary = run_with_importers(&mut catalog, importers, false)
            .await
            .unwrap();

        assert_eq!(summary.references_count, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.crawl_errors, vec!["https://x.example/x2"]);
    }

    #[tokio::test]
    async fn dry_run_leaves_catalog_untouched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let imp = StubImporter::new("x", vec![tea("x1", "Tea X1")], Arc::clone(&log));

        let mut catalog = Catalog::open_in_memory().unwrap();
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(imp)];
        let summary = run_with_importers(&mut catalog, importers, true)
            .await
            .unwrap();
        assert_eq!(summary.inserted, 1);

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.vendors, 0);
        assert_eq!(stats.categories, 0);
        assert_eq!(stats.active_teas, 0);
        assert_eq!(stats.deleted_teas, 0);
    }

    #[tokio::test]
    async fn vanished_teas_are_flagged_per_importer() {
        let mut catalog = Catalog::open_in_memory().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let first = StubImporter::new(
            "x",
            vec![tea("a", "Tea A"), tea("b", "Tea B"), tea("c", "Tea C")],
            Arc::clone(&log),
        );
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(first)];
        run_with_importers(&mut catalog, importers, false)
            .await
            .unwrap();

        let second = StubImporter::new(
            "x",
            vec![tea("a", "Tea A"), tea("c", "Tea C")],
            Arc::clone(&log),
        );
        let importers: Vec<Box<dyn VendorImporter>> = vec![Box::new(second)];
        run_with_importers(&mut catalog, importers, false)
            .await
            .unwrap();

        let tx = catalog.transaction().unwrap();
        let deleted: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT vendor_internal_id FROM teas WHERE deleted_at IS NOT NULL
                     ORDER BY vendor_internal_id",
                )
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.collect::<rusqlite::Result<_>>().unwrap()
        };
        assert_eq!(deleted, vec!["b"]);
    }
}
