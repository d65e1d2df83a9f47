// src/vendors/mariage.rs

//! Importer for the Mariage Frères catalog.
//!
//! References come from the footer category blocks and the four main menus
//! of the homepage. Product URLs embed a reference code (`T8201`,
//! `TC7001`); several URL variants can point at the same tea, so the
//! analyze phase groups raw links by numeric id and keeps the variant whose
//! code is plain `T<number>` when one exists.

use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};

use super::{TeaYield, VendorImporter, classify};
use crate::models::{BrewingHints, CategoryDef, TeaRecord, VendorInfo};
use crate::utils::http::FetchClient;
use crate::utils::text::normalize_whitespace;

const BASE_URL: &str = "http://www.mariagefreres.com";
const BASE_FR: &str = "http://www.mariagefreres.com/FR";
const HOMEPAGE: &str = "http://www.mariagefreres.com/FR/accueil.html";

const PREPARATION_LABEL: &str = "CONSEILS DE PRÉPARATION :";

/// One canonical tea page after deduplication.
#[derive(Debug, Clone)]
struct CanonicalLink {
    internal_id: String,
    link: String,
}

/// Strip leading and trailing `<br>` tags and whitespace.
fn trim_breaks(mut s: &str) -> &str {
    loop {
        let before = s;
        s = s.trim();
        for token in ["<br>", "<br/>"] {
            s = s.strip_prefix(token).unwrap_or(s);
            s = s.strip_suffix(token).unwrap_or(s);
        }
        if s == before {
            return s;
        }
    }
}

pub struct MariageImporter {
    client: FetchClient,
    vendor: VendorInfo,
    selectors: Selectors,
    re_keep_number: Regex,

    reference_pages: Vec<String>,
    next_page: usize,
    raw_links: Vec<String>,
    canonical: Vec<CanonicalLink>,
    cursor: usize,
    failed: Vec<String>,
    retrieved_ids: Vec<String>,
}

struct Selectors {
    footer_blocks: Selector,
    footer_links: Selector,
    menus: Vec<Selector>,
    product_links: Selector,
    name: Selector,
    description: Selector,
    long_description: Selector,
    preparation: Selector,
    suggestion: Selector,
    image: Selector,
    reference: Selector,
    tags: Selector,
}

impl Selectors {
    fn new() -> Self {
        let sel = |s: &str| Selector::parse(s).expect("valid selector");
        Self {
            footer_blocks: sel("#bas_centre div#bas_centre_rep"),
            footer_links: sel(".bas_lien a"),
            menus: (2..=5)
                .map(|n| sel(&format!("#menu_{n} .s-menu_{n} a")))
                .collect(),
            product_links: sel("a.Lien-Titre-Liste"),
            name: sel("h1"),
            description: sel("h2"),
            long_description: sel("#fiche_desc"),
            preparation: sel("#fiche_conseil_prepa"),
            suggestion: sel("#fiche_suggestion"),
            image: sel("#A9.valignmiddle img"),
            reference: sel("#fiche_ref_div"),
            tags: sel("#A11 a.fiche_ref_lien"),
        }
    }
}

impl MariageImporter {
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            vendor: VendorInfo {
                name: "Mariage Frères".to_string(),
                slug: "mf".to_string(),
                description: "Thé français depuis 1854".to_string(),
                link: BASE_URL.to_string(),
                logo: Some(
                    "https://upload.wikimedia.org/wikipedia/commons/a/ad/Logo_seul.jpg"
                        .to_string(),
                ),
                display_order: 1,
            },
            selectors: Selectors::new(),
            re_keep_number: Regex::new(r"[^0-9.]").expect("valid regex"),
            reference_pages: Vec::new(),
            next_page: 0,
            raw_links: Vec::new(),
            canonical: Vec::new(),
            cursor: 0,
            failed: Vec::new(),
            retrieved_ids: Vec::new(),
        }
    }

    /// Make a site-relative `./...` href absolute under the FR section.
    fn absolutize(href: &str) -> String {
        match href.strip_prefix("./") {
            Some(rest) => format!("{BASE_FR}/{rest}"),
            None => href.to_string(),
        }
    }

    /// Extract the reference code and its numeric part from a product URL.
    ///
    /// `.../the-noir-TC7001.html` yields `("TC7001", 7001)`.
    fn extract_tea_id(link: &str) -> Option<(String, u64)> {
        let last = link.rsplit('/').next()?;
        let stem = last.split('.').next().unwrap_or(last);
        let raw = stem.rsplit('-').next().unwrap_or(stem).to_uppercase();
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let numeric = digits.parse().ok()?;
        Some((raw, numeric))
    }

    fn collect_reference_pages(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut pages = Vec::new();

        // Third footer block holds the tea family links
        if let Some(block) = document.select(&self.selectors.footer_blocks).nth(2) {
            for link in block.select(&self.selectors.footer_links) {
                if let Some(href) = link.value().attr("href") {
                    pages.push(Self::absolutize(href));
                }
            }
        }

        for menu in &self.selectors.menus {
            for link in document.select(menu) {
                if let Some(href) = link.value().attr("href") {
                    pages.push(Self::absolutize(href));
                }
            }
        }

        pages
    }

    fn scan_reference_page(&mut self, html: &str) {
        let document = Html::parse_document(html);
        for link in document.select(&self.selectors.product_links) {
            if let Some(href) = link.value().attr("href") {
                let href = Self::absolutize(href);
                if !self.raw_links.contains(&href) {
                    self.raw_links.push(href);
                }
            }
        }
    }

    fn parse_brewing(&self, document: &Html) -> BrewingHints {
        let mut hints = BrewingHints::default();

        let Some(block) = document.select(&self.selectors.preparation).next() else {
            // Some pages carry a free-form suggestion instead
            if let Some(block) = document.select(&self.selectors.suggestion).next() {
                let raw = block.text().collect::<String>().replace(PREPARATION_LABEL, "");
                hints.raw = Some(normalize_whitespace(&raw));
            }
            return hints;
        };

        let raw = block.text().collect::<String>().replace(PREPARATION_LABEL, "");
        let raw = normalize_whitespace(&raw);

        // Usual format: "2,5 g / 20 cl - 95°C - 5 min"
        let normalized = raw.replace('/', "-").replace(',', ".").to_lowercase();
        for part in normalized.split(" - ") {
            let number = self.re_keep_number.replace_all(part, "");
            let Ok(value) = number.parse::<f64>() else {
                continue;
            };
            if part.contains("cl") {
                hints.volume_cl = Some(value as i64);
            } else if part.contains('c') {
                hints.temperature_c = Some(value as i64);
            } else if part.contains('g') {
                hints.mass_mg = Some((value * 1000.0) as i64);
            } else if part.contains("min") {
                hints.duration_secs = Some((value * 60.0) as i64);
            }
        }

        hints.raw = Some(raw);
        hints
    }

    fn parse_price(&self, document: &Html) -> (Option<f64>, Option<String>) {
        let Some(block) = document.select(&self.selectors.reference).next() else {
            return (None, None);
        };

        // Raw format: "Ref : T8201  -  Prix : 8€ / 100g"
        let text = block.text().collect::<String>().replace('\u{a0}', "");
        let parts: Vec<&str> = text.split('-').collect();
        if parts.len() < 2 {
            return (None, None);
        }

        let segment: Vec<&str> = parts[1].trim().split(':').collect();
        let value = if segment.len() >= 2 { segment[1] } else { segment[0] };

        let (price_raw, unit) = match value.split_once('/') {
            Some((price, unit)) => (price.trim(), unit.trim().to_string()),
            None => (value.trim(), "boîte".to_string()),
        };

        let price = self
            .re_keep_number
            .replace_all(price_raw, "")
            .parse::<f64>()
            .ok();

        (price, price.is_some().then_some(unit))
    }

    fn parse_item_page(&self, html: &str, item: &CanonicalLink) -> Option<TeaYield> {
        let document = Html::parse_document(html);

        let name_elem = document.select(&self.selectors.name).next()?;
        let name = normalize_whitespace(
            &name_elem
                .text()
                .collect::<String>()
                .replace(['®', '©', '™'], ""),
        );

        let description = normalize_whitespace(
            &document
                .select(&self.selectors.description)
                .next()?
                .text()
                .collect::<String>(),
        );

        let long_description = document
            .select(&self.selectors.long_description)
            .next()
            .map(|el| {
                let inner = el.inner_html().replace("</br>", "");
                trim_breaks(&inner).to_string()
            })
            .filter(|s| !s.is_empty());

        let brewing = self.parse_brewing(&document);

        let illustration = document
            .select(&self.selectors.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| format!("{BASE_FR}/{}", src.trim_start_matches("./")));

        let (price, price_unit) = self.parse_price(&document);

        let tags: Vec<String> = document
            .select(&self.selectors.tags)
            .map(|tag| {
                tag.text()
                    .collect::<String>()
                    .trim()
                    .trim_matches('#')
                    .trim()
                    .to_lowercase()
            })
            .collect();

        let mut haystacks = tags;
        haystacks.push(description.clone());
        let categories: Vec<&'static CategoryDef> = classify(&haystacks);

        let record = TeaRecord {
            vendor_internal_id: item.internal_id.clone(),
            name,
            description: Some(description).filter(|s| !s.is_empty()),
            long_description,
            ingredients: None,
            brewing,
            illustration,
            price,
            price_unit,
            link: item.link.clone(),
        };

        Some((Some(record), categories))
    }
}

#[async_trait::async_trait]
impl VendorImporter for MariageImporter {
    fn vendor(&self) -> &VendorInfo {
        &self.vendor
    }

    async fn prepare_references(&mut self) -> Option<usize> {
        let html = self.client.get_text(HOMEPAGE).await?;
        self.reference_pages = self.collect_reference_pages(&html);
        Some(self.reference_pages.len())
    }

    async fn next_reference_page(&mut self) -> Option<()> {
        let page = self.reference_pages.get(self.next_page)?.clone();
        self.next_page += 1;

        match self.client.get_text(&page).await {
            Some(html) => self.scan_reference_page(&html),
            None => self.failed.push(page),
        }
        Some(())
    }

    fn analyze_references(&mut self) -> (usize, Vec<String>) {
        // Group raw links by numeric id, filtering non-tea items (their
        // reference codes do not start with T) on the fly.
        let mut by_id: BTreeMap<u64, Vec<(String, String)>> = BTreeMap::new();
        for link in &self.raw_links {
            let Some((raw_id, numeric)) = Self::extract_tea_id(link) else {
                continue;
            };
            if !raw_id.starts_with('T') {
                continue;
            }
            by_id.entry(numeric).or_default().push((raw_id, link.clone()));
        }

        for (numeric, variants) in &by_id {
            let best = variants
                .iter()
                .find(|(id, _)| id.trim_end_matches(|c: char| c.is_ascii_digit()) == "T")
                .or_else(|| variants.first());

            if let Some((_, link)) = best {
                self.canonical.push(CanonicalLink {
                    internal_id: numeric.to_string(),
                    link: link.clone(),
                });
            }
        }

        (self.canonical.len(), std::mem::take(&mut self.failed))
    }

    async fn next_tea(&mut self) -> Option<TeaYield> {
        let item = self.canonical.get(self.cursor)?.clone();
        self.cursor += 1;

        let Some(html) = self.client.get_text(&item.link).await else {
            self.failed.push(item.link);
            return Some((None, Vec::new()));
        };

        match self.parse_item_page(&html, &item) {
            Some(result) => {
                self.retrieved_ids.push(item.internal_id);
                Some(result)
            }
            None => {
                self.failed.push(item.link);
                Some((None, Vec::new()))
            }
        }
    }

    fn crawl_errors(&self) -> &[String] {
        &self.failed
    }

    fn retrieved_internal_ids(&self) -> &[String] {
        &self.retrieved_ids
    }
}
