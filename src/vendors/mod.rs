// src/vendors/mod.rs

//! Vendor importers.
//!
//! One importer per vendor site, each implementing the staged
//! [`VendorImporter`] contract:
//!
//! 1. `prepare_references`: plan the reference pages to visit
//! 2. `next_reference_page`: fetch and scan one planned page per pull
//! 3. `analyze_references`: deduplicate raw links to one per tea
//! 4. `next_tea`: fetch and parse one canonical tea page per pull
//! 5. terminal accounting: crawl errors and retrieved internal ids
//!
//! An importer instance handles exactly one run; the sequences are
//! pull-based cursors and cannot be restarted.

mod mariage;
mod newby;

pub use mariage::MariageImporter;
pub use newby::NewbyImporter;

use async_trait::async_trait;

use crate::models::{CATEGORIES, CategoryDef, TeaRecord, VendorInfo};
use crate::utils::http::FetchClient;

/// One element of a crawl sequence: the parsed record, or `None` when the
/// page failed to parse or was intentionally excluded, plus its categories.
pub type TeaYield = (Option<TeaRecord>, Vec<&'static CategoryDef>);

/// Staged contract every vendor importer implements.
#[async_trait]
pub trait VendorImporter: Send {
    /// Identity of the vendor this importer scrapes.
    fn vendor(&self) -> &VendorInfo;

    /// Plan the reference pages to visit and return how many pulls
    /// `next_reference_page` will serve, or `None` if the site's entry
    /// point is unreachable. A `None` excludes this importer from the
    /// rest of the run without affecting the others.
    async fn prepare_references(&mut self) -> Option<usize>;

    /// Fetch and scan one planned reference page.
    ///
    /// Yields exactly once per planned page whether or not the fetch
    /// succeeded; failures accumulate internally. Returns `None` once all
    /// planned pages are consumed.
    async fn next_reference_page(&mut self) -> Option<()>;

    /// Deduplicate the raw links gathered so far down to one canonical
    /// link per distinct tea. Returns the canonical count and drains the
    /// page-level failures accumulated during collection.
    fn analyze_references(&mut self) -> (usize, Vec<String>);

    /// Fetch and parse one canonical tea page.
    ///
    /// Yields exactly one element per canonical link, in order, so a
    /// progress counter driven by the analyze count stays accurate even
    /// when individual pages fail. Returns `None` when exhausted.
    async fn next_tea(&mut self) -> Option<TeaYield>;

    /// Item pages that failed during the crawl. Meaningful only after
    /// `next_tea` is fully drained.
    fn crawl_errors(&self) -> &[String];

    /// Every vendor-internal id successfully observed this run, used to
    /// flag vanished teas. Meaningful only after `next_tea` is drained.
    fn retrieved_internal_ids(&self) -> &[String];
}

/// Names of every registered importer, in registry order.
pub fn names() -> &'static [&'static str] {
    &["mariage", "newby"]
}

/// Instantiate the importer registered under `name`.
pub fn create(name: &str, client: &FetchClient) -> Option<Box<dyn VendorImporter>> {
    match name {
        "mariage" => Some(Box::new(MariageImporter::new(client.clone()))),
        "newby" => Some(Box::new(NewbyImporter::new(client.clone()))),
        _ => None,
    }
}

/// Match free-text haystacks against the category keyword table.
///
/// Matching is case-insensitive and substring-based. All matching
/// categories are returned, each at most once, in table order.
pub fn classify<S: AsRef<str>>(haystacks: &[S]) -> Vec<&'static CategoryDef> {
    let lowered: Vec<String> = haystacks
        .iter()
        .map(|h| h.as_ref().to_lowercase())
        .collect();

    CATEGORIES
        .iter()
        .filter(|category| {
            category.keywords.iter().any(|keyword| {
                let keyword = keyword.to_lowercase();
                lowered.iter().any(|haystack| haystack.contains(&keyword))
            })
        })
        .collect()
}
