// src/vendors/newby.rs

//! Importer for the Newby Teas shop.
//!
//! The shop has no structured brewing data: advice comes as free-form
//! sentences ("Use one teaspoon of tea per cup...") that are mined with a
//! small set of patterns. Gift boxes and accessories are filtered out both
//! on listing pages and as a safety net on item pages.

use regex::Regex;
use scraper::{Html, Selector};

use super::{TeaYield, VendorImporter, classify};
use crate::models::{BrewingHints, TeaRecord, VendorInfo};
use crate::utils::http::FetchClient;
use crate::utils::text::normalize_whitespace;

const HOME_URL: &str = "https://www.newbyteas.com";
const SHOP_URL: &str = "https://www.newbyteas.co.uk";

/// Listing entries with these in their name are not single teas.
const LISTING_EXCLUDES: &[&str] = &["Tea Bags", "Selection Box", "Gift Selection", "Gift Set"];

/// Item pages with these in their name are not single teas either.
const ITEM_EXCLUDES: &[&str] = &["Gift Box", "Advent Calendar", "Accessories"];

pub struct NewbyImporter {
    client: FetchClient,
    vendor: VendorInfo,
    selectors: Selectors,
    patterns: BrewingPatterns,

    reference_pages: Vec<String>,
    next_page: usize,
    tea_links: Vec<String>,
    cursor: usize,
    failed: Vec<String>,
    retrieved_ids: Vec<String>,
}

struct Selectors {
    nav_links: Selector,
    grid_items: Selector,
    grid_item_link: Selector,
    product: Selector,
    product_name: Selector,
    meta_keywords: Selector,
    short_description: Selector,
    info_rows: Selector,
    row_title: Selector,
    row_value: Selector,
    sku: Selector,
    image: Selector,
    price: Selector,
}

impl Selectors {
    fn new() -> Self {
        let sel = |s: &str| Selector::parse(s).expect("valid selector");
        Self {
            nav_links: sel("#nav li > ul li a"),
            grid_items: sel(".products-grid li.item"),
            grid_item_link: sel("h2 a"),
            product: sel(".product-view"),
            product_name: sel(".product-name"),
            meta_keywords: sel(r#"meta[name="keywords"]"#),
            short_description: sel(".short-description"),
            info_rows: sel(".box-collateral .box-additional table tr"),
            row_title: sel("th"),
            row_value: sel("td"),
            sku: sel(".sku .value"),
            image: sel(".product-image a.product-image-gallery"),
            price: sel(".price-box .price"),
        }
    }
}

/// Patterns mined out of the human brewing advice.
struct BrewingPatterns {
    place: Regex,
    use_spoon: Regex,
    use_grams: Regex,
    use_water: Regex,
    temperature: Regex,
    duration: Regex,
    strip_non_numbers: Regex,
}

impl BrewingPatterns {
    fn new() -> Self {
        let re = |s: &str| Regex::new(s).expect("valid regex");
        Self {
            place: re(
                r"place (?:(?P<silk>[a-z0-9]+) silken pyramid|(?P<grams>\d+) ?g per cup|(?P<spoons>[a-z0-9]+) teaspoons? ?(?:of tea ?)?(?:\(\d+g\))?) (?:in|into) (?P<boil>water|boiled water|freshly boiled water|freshly, fully boiled water)",
            ),
            use_spoon: re(
                r"use (?P<spoons>[a-z0-9-]+) tea(?:- )?spoons? (?:of tea )?per (?P<container>cup|[0-9- ]+ ?ml)(?: \(approx\.? (?P<size>[0-9- ]+ ?ml)\))?",
            ),
            use_grams: re(
                r"use (?P<grams>\d+) ?g of (?:matcha powder|tea) per (?P<size>[0-9- ]+ ?ml) of (?P<boiled>boiled )?water",
            ),
            use_water: re(r"use (?:fresh, fully boiled|freshly boiled|freshly-boiled) water"),
            temperature: re(
                r"(?:left to cool to|cooled to|at a temperature of|cooled at|until it reaches about) (?P<temp>[0-9- ]+) *(?:c\b|degrees?)",
            ),
            duration: re(r"for (?P<duration>[a-z0-9- ]+?) (?:minutes?|mins?)"),
            strip_non_numbers: re(r"[^0-9.,]"),
        }
    }
}

/// Convert a number, a number word, or an interval of either to a value.
/// Intervals ("3-4") average out.
fn human_number(text: &str) -> Option<f64> {
    const WORDS: &[(&str, i64)] = &[
        ("zero", 0),
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
        ("seven", 7),
        ("eight", 8),
        ("nine", 9),
        ("ten", 10),
        ("eleven", 11),
        ("twelve", 12),
    ];

    let mut values = Vec::new();
    for part in text.split('-') {
        let part = part.trim();
        if let Some((_, value)) = WORDS.iter().find(|(word, _)| *word == part) {
            values.push(*value as f64);
        } else if let Ok(value) = part.parse::<i64>() {
            values.push(value as f64);
        }
    }

    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn capitalize_phrase(phrase: &str) -> String {
    let mut chars = phrase.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl NewbyImporter {
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            vendor: VendorInfo {
                name: "Newby".to_string(),
                slug: "newby".to_string(),
                description: "Luxury teas, tisanes & tea gifts".to_string(),
                link: HOME_URL.to_string(),
                logo: Some(format!(
                    "{SHOP_URL}/skin/frontend/ultimo/default/images/newbylogo2017.png"
                )),
                display_order: 2,
            },
            selectors: Selectors::new(),
            patterns: BrewingPatterns::new(),
            reference_pages: Vec::new(),
            next_page: 0,
            tea_links: Vec::new(),
            cursor: 0,
            failed: Vec::new(),
            retrieved_ids: Vec::new(),
        }
    }

    fn collect_reference_pages(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.nav_links)
            .filter_map(|link| link.value().attr("href"))
            .filter(|href| !href.contains("newby-accessories"))
            .filter(|href| href.trim_matches('/') != SHOP_URL)
            .map(str::to_string)
            .collect()
    }

    fn scan_reference_page(&mut self, html: &str, page_url: &str) {
        let document = Html::parse_document(html);
        for item in document.select(&self.selectors.grid_items) {
            let Some(link) = item.select(&self.selectors.grid_item_link).next() else {
                continue;
            };
            let name: String = link.text().collect();
            if LISTING_EXCLUDES.iter().any(|kw| name.contains(kw)) {
                continue;
            }
            if let Some(href) = link.value().attr("href") {
                let href = crate::utils::resolve(page_url, href)
                    .unwrap_or_else(|| href.to_string());
                self.tea_links.push(href);
            }
        }
    }

    /// Mine structured hints out of the free-form advice text.
    fn parse_brewing_text(&self, raw: &str, tags: &[String]) -> BrewingHints {
        let mut hints = BrewingHints {
            raw: Some(raw.to_string()),
            // One teaspoon per cup unless the text says otherwise
            mass_mg: Some(2000),
            volume_cl: Some(25),
            ..BrewingHints::default()
        };

        if raw.contains("http://") {
            // The advice is just a link to the brewing guide; fall back to
            // defaults by tea family.
            let light = tags.iter().any(|t| t == "white tea" || t == "green tea");
            hints.temperature_c = Some(if light { 80 } else { 95 });
            let mut duration = if light { 3 * 60 } else { 4 * 60 };
            if !tags.iter().any(|t| t == "loose leaf tea") {
                duration -= 60;
            }
            hints.duration_secs = Some(duration);
            return hints;
        }

        if raw.to_lowercase() == "n/a" {
            return BrewingHints {
                raw: Some("(Pas de conseil disponible)".to_string()),
                ..BrewingHints::default()
            };
        }

        let normalized = raw.to_lowercase().replace('\u{00B0}', " ").replace('\u{2013}', "-");
        for phrase in normalized.split('.').map(str::trim) {
            if let Some(caps) = self.patterns.place.captures(phrase) {
                if let Some(silk) = caps.name("silk").and_then(|m| human_number(m.as_str())) {
                    hints.mass_mg = Some(-(silk as i64));
                } else if let Some(grams) =
                    caps.name("grams").and_then(|m| human_number(m.as_str()))
                {
                    hints.mass_mg = Some((grams * 1000.0) as i64);
                } else if let Some(spoons) =
                    caps.name("spoons").and_then(|m| human_number(m.as_str()))
                {
                    hints.mass_mg = Some((spoons * 2000.0) as i64);
                }
                if let Some(boil) = caps.name("boil") {
                    hints.temperature_c = Some(if boil.as_str().contains("fully") { 100 } else { 95 });
                }
            }

            if let Some(caps) = self.patterns.use_spoon.captures(phrase) {
                if let Some(spoons) = caps.name("spoons").and_then(|m| human_number(m.as_str())) {
                    hints.mass_mg = Some((spoons * 2000.0) as i64);
                }
                let container = caps.name("container").map(|m| m.as_str());
                let size = caps.name("size").map(|m| m.as_str());
                let container_size = match (container, size) {
                    (Some("cup"), Some(size)) => Some(size),
                    (Some("cup"), None) => None,
                    (container, _) => container,
                };
                if let Some(ml) =
                    container_size.and_then(|s| human_number(s.replace("ml", "").trim()))
                {
                    hints.volume_cl = Some((ml / 10.0) as i64);
                }
            }

            if let Some(caps) = self.patterns.use_grams.captures(phrase) {
                if let Some(grams) = caps.name("grams").and_then(|m| human_number(m.as_str())) {
                    hints.mass_mg = Some((grams * 1000.0) as i64);
                }
                if let Some(ml) = caps
                    .name("size")
                    .and_then(|m| human_number(m.as_str().replace("ml", "").trim()))
                {
                    hints.volume_cl = Some((ml / 10.0) as i64);
                }
                if caps.name("boiled").is_some() {
                    hints.temperature_c = Some(95);
                }
            }

            if self.patterns.use_water.is_match(phrase) {
                hints.temperature_c = Some(if phrase.contains("fully") { 100 } else { 95 });
            }

            if let Some(caps) = self.patterns.temperature.captures(phrase) {
                if let Some(temp) = caps.name("temp").and_then(|m| human_number(m.as_str())) {
                    hints.temperature_c = Some(temp as i64);
                }
            }

            if let Some(caps) = self.patterns.duration.captures(phrase) {
                if let Some(minutes) =
                    caps.name("duration").and_then(|m| human_number(m.as_str()))
                {
                    hints.duration_secs = Some(minutes.ceil() as i64 * 60);
                }
            }

            if phrase.contains("a second brew can be enjoyed using the same leaf") {
                hints.max_brews = 2;
            }

            if phrase.contains("watch as the bulb blossoms")
                || phrase.contains("whisk well until the powder")
            {
                let extra = capitalize_phrase(phrase);
                hints.extra = Some(match hints.extra.take() {
                    Some(existing) => format!("{existing} {extra}"),
                    None => extra,
                });
            }
        }

        hints
    }

    /// Deterministic fallback identifier when a page carries no SKU.
    fn link_stem(link: &str) -> String {
        link.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(link)
            .trim_end_matches(".html")
            .to_string()
    }

    fn parse_item_page(&mut self, html: &str, link: &str) -> Option<TeaYield> {
        let document = Html::parse_document(html);

        let product = match document.select(&self.selectors.product).next() {
            Some(product) => product,
            // Not a product page at all; nothing to record
            None => return Some((None, Vec::new())),
        };

        let Some(name_elem) = product.select(&self.selectors.product_name).next() else {
            self.failed.push(link.to_string());
            return Some((None, Vec::new()));
        };
        let mut name = normalize_whitespace(&name_elem.text().collect::<String>());

        if ITEM_EXCLUDES.iter().any(|kw| name.contains(kw)) {
            return Some((None, Vec::new()));
        }

        let tags: Vec<String> = document
            .select(&self.selectors.meta_keywords)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(|content| {
                content
                    .split(',')
                    .map(|tag| tag.trim().to_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        // Some names carry the description up front: "Silken Pyramids - Earl Grey"
        let mut description = String::new();
        if let Some((head, rest)) = name.split_once(" - ") {
            description = head.trim().to_string();
            name = rest.trim().to_string();
        }

        let long_description = product
            .select(&self.selectors.short_description)
            .next()
            .map(|el| el.inner_html().trim().to_string())
            .filter(|s| !s.is_empty());

        let mut brewing = BrewingHints::default();
        let mut ingredients = None;
        let mut price_unit = None;

        for row in product.select(&self.selectors.info_rows) {
            let Some(title_elem) = row.select(&self.selectors.row_title).next() else {
                continue;
            };
            let title = title_elem.text().collect::<String>().to_lowercase();
            let value = row
                .select(&self.selectors.row_value)
                .next()
                .map(|el| normalize_whitespace(&el.text().collect::<String>()));

            if title.contains("cup") {
                if let Some(raw) = value {
                    brewing = self.parse_brewing_text(&raw, &tags);
                }
            } else if title.contains("ingredient") {
                ingredients = value.filter(|s| !s.is_empty());
            } else if title.contains("weight") {
                price_unit = Some(match value.and_then(|v| v.parse::<f64>().ok()) {
                    Some(grams) => format!("{}g", grams as i64),
                    None => "100g".to_string(),
                });
            }
        }

        let mut internal_id = product
            .select(&self.selectors.sku)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Self::link_stem(link));

        // SKUs are occasionally reused across variants; disambiguate
        if self.retrieved_ids.contains(&internal_id) {
            internal_id = format!("{internal_id}-{}", Self::link_stem(link));
        }
        if self.retrieved_ids.contains(&internal_id) {
            internal_id = format!("{internal_id}-{}", self.cursor);
        }
        self.retrieved_ids.push(internal_id.clone());

        let illustration = product
            .select(&self.selectors.image)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string);

        let price = product
            .select(&self.selectors.price)
            .next()
            .map(|el| el.text().collect::<String>())
            .and_then(|text| {
                self.patterns
                    .strip_non_numbers
                    .replace_all(&text, "")
                    .replace(',', ".")
                    .parse::<f64>()
                    .ok()
            });

        let mut haystacks = tags.clone();
        haystacks.push(name.clone());
        haystacks.push(description.clone());
        if let Some(long) = &long_description {
            haystacks.push(long.clone());
        }
        let categories = classify(&haystacks);

        let record = TeaRecord {
            vendor_internal_id: internal_id,
            name,
            description: Some(description).filter(|s| !s.is_empty()),
            long_description,
            ingredients,
            brewing,
            illustration,
            price,
            price_unit,
            link: link.to_string(),
        };

        Some((Some(record), categories))
    }
}

#[async_trait::async_trait]
impl VendorImporter for NewbyImporter {
    fn vendor(&self) -> &VendorInfo {
        &self.vendor
    }

    async fn prepare_references(&mut self) -> Option<usize> {
        let html = self.client.get_text(SHOP_URL).await?;
        self.reference_pages = self.collect_reference_pages(&html);
        Some(self.reference_pages.len())
    }

    async fn next_reference_page(&mut self) -> Option<()> {
        let page = self.reference_pages.get(self.next_page)?.clone();
        self.next_page += 1;

        match self.client.get_text(&page).await {
            Some(html) => self.scan_reference_page(&html, &page),
            None => self.failed.push(page),
        }
        Some(())
    }

    fn analyze_references(&mut self) -> (usize, Vec<String>) {
        (self.tea_links.len(), std::mem::take(&mut self.failed))
    }

    async fn next_tea(&mut self) -> Option<TeaYield> {
        let link = self.tea_links.get(self.cursor)?.clone();
        self.cursor += 1;

        let Some(html) = self.client.get_text(&link).await else {
            self.failed.push(link);
            return Some((None, Vec::new()));
        };

        self.parse_item_page(&html, &link)
    }

    fn crawl_errors(&self) -> &[String] {
        &self.failed
    }

    fn retrieved_internal_ids(&self) -> &[String] {
        &self.retrieved_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchConfig;

    fn importer() -> NewbyImporter {
        let client = FetchClient::new(&FetchConfig::default()).unwrap();
        NewbyImporter::new(client)
    }

    #[test]
    fn human_number_parses_words_and_intervals() {
        assert_eq!(human_number("two"), Some(2.0));
        assert_eq!(human_number("3"), Some(3.0));
        assert_eq!(human_number("3-4"), Some(3.5));
        assert_eq!(human_number("three-four"), Some(3.5));
        assert_eq!(human_number("cup"), None);
    }

    #[test]
    fn brewing_text_extracts_spoons_volume_and_time() {
        let imp = importer();
        let hints = imp.parse_brewing_text(
            "Use two teaspoons of tea per 200 ml. Brew for 3-4 minutes in freshly boiled water.",
            &[],
        );
        assert_eq!(hints.mass_mg, Some(4000));
        assert_eq!(hints.volume_cl, Some(20));
        assert_eq!(hints.duration_secs, Some(240));
    }

    #[test]
    fn brewing_text_extracts_place_pattern() {
        let imp = importer();
        let hints = imp.parse_brewing_text(
            "Place 2g per cup into freshly, fully boiled water. Brew for 4 minutes.",
            &[],
        );
        assert_eq!(hints.mass_mg, Some(2000));
        assert_eq!(hints.temperature_c, Some(100));
        assert_eq!(hints.duration_secs, Some(240));
    }

    #[test]
    fn brewing_text_extracts_cooled_temperature() {
        let imp = importer();
        let hints = imp.parse_brewing_text(
            "Use freshly boiled water left to cool to 80°C. Brew for 3 minutes.",
            &[],
        );
        assert_eq!(hints.temperature_c, Some(80));
        assert_eq!(hints.duration_secs, Some(180));
    }

    #[test]
    fn brewing_text_detects_second_brew() {
        let imp = importer();
        let hints = imp.parse_brewing_text(
            "Brew for 2 minutes. A second brew can be enjoyed using the same leaf.",
            &[],
        );
        assert_eq!(hints.max_brews, 2);
    }

    #[test]
    fn brewing_link_falls_back_to_family_defaults() {
        let imp = importer();
        let tags = vec!["green tea".to_string(), "loose leaf tea".to_string()];
        let hints = imp.parse_brewing_text("http://www.newbyteas.co.uk/brewing", &tags);
        assert_eq!(hints.temperature_c, Some(80));
        assert_eq!(hints.duration_secs, Some(180));

        let hints = imp.parse_brewing_text("http://www.newbyteas.co.uk/brewing", &[]);
        assert_eq!(hints.temperature_c, Some(95));
        // Bagged teas steep one minute less
        assert_eq!(hints.duration_secs, Some(180));
    }

    #[test]
    fn brewing_not_available_marker() {
        let imp = importer();
        let hints = imp.parse_brewing_text("N/A", &[]);
        assert_eq!(hints.raw.as_deref(), Some("(Pas de conseil disponible)"));
        assert_eq!(hints.mass_mg, None);
        assert_eq!(hints.volume_cl, None);
    }

    #[test]
    fn listing_scan_skips_gift_entries() {
        let mut imp = importer();
        let html = r#"
            <ul class="products-grid">
              <li class="item"><h2><a href="https://shop/earl-grey.html">Earl Grey</a></h2></li>
              <li class="item"><h2><a href="https://shop/gifts.html">Gift Selection 2018</a></h2></li>
              <li class="item"><h2><a href="https://shop/green.html">Green Sencha Tea Bags</a></h2></li>
              <li class="item"><h2><a href="jasmine.html">Jasmine</a></h2></li>
            </ul>
        "#;
        imp.scan_reference_page(html, "https://www.newbyteas.co.uk/black-tea/");
        assert_eq!(
            imp.tea_links,
            vec![
                "https://shop/earl-grey.html",
                "https://www.newbyteas.co.uk/black-tea/jasmine.html",
            ]
        );
    }

    #[test]
    fn nav_scan_excludes_accessories() {
        let imp = importer();
        let html = r#"
            <div id="nav"><li><ul>
              <li><a href="https://www.newbyteas.co.uk/black-tea">Black</a></li>
              <li><a href="https://www.newbyteas.co.uk/newby-accessories">Accessories</a></li>
              <li><a href="https://www.newbyteas.co.uk/">Home</a></li>
            </ul></li></div>
        "#;
        let pages = imp.collect_reference_pages(html);
        assert_eq!(pages, vec!["https://www.newbyteas.co.uk/black-tea"]);
    }

    #[test]
    fn parses_full_item_page() {
        let mut imp = importer();
        let html = r#"
            <html><head>
              <meta name="keywords" content="Green Tea, Loose Leaf Tea, Jasmine"/>
            </head><body><div class="product-view">
              <div class="product-name">Loose Leaf - Jasmine Princess</div>
              <div class="short-description">A fragrant green tea.</div>
              <div class="sku"><span class="label">SKU</span><span class="value">NB1042</span></div>
              <div class="product-image">
                <a class="product-image-gallery" href="https://shop/media/jasmine.jpg"></a>
              </div>
              <div class="price-box"><span class="price">£12.50</span></div>
              <div class="box-collateral"><div class="box-additional"><table>
                <tr><th>Per Cup</th><td>Use one teaspoon of tea per cup. Brew for 3 minutes
                    in freshly boiled water left to cool to 80°C.</td></tr>
                <tr><th>Ingredients</th><td>Green tea, jasmine blossoms</td></tr>
                <tr><th>Weight</th><td>100</td></tr>
              </table></div></div>
            </div></body></html>
        "#;

        let (record, categories) = imp.parse_item_page(html, "https://shop/jasmine-princess.html").unwrap();
        let record = record.unwrap();

        assert_eq!(record.vendor_internal_id, "NB1042");
        assert_eq!(record.name, "Jasmine Princess");
        assert_eq!(record.description.as_deref(), Some("Loose Leaf"));
        assert_eq!(record.long_description.as_deref(), Some("A fragrant green tea."));
        assert_eq!(record.ingredients.as_deref(), Some("Green tea, jasmine blossoms"));
        assert_eq!(record.price, Some(12.5));
        assert_eq!(record.price_unit.as_deref(), Some("100g"));
        assert_eq!(record.illustration.as_deref(), Some("https://shop/media/jasmine.jpg"));
        assert_eq!(record.brewing.mass_mg, Some(2000));
        assert_eq!(record.brewing.duration_secs, Some(180));
        assert_eq!(record.brewing.temperature_c, Some(80));

        let slugs: Vec<&str> = categories.iter().map(|c| c.slug).collect();
        assert_eq!(slugs, vec!["vert", "jasmin"]);
        assert_eq!(imp.retrieved_ids, vec!["NB1042"]);
    }

    #[test]
    fn duplicate_sku_gets_link_suffix() {
        let mut imp = importer();
        imp.retrieved_ids.push("NB1042".to_string());

        let html = r#"
            <div class="product-view">
              <div class="product-name">Jasmine Princess Refill</div>
              <div class="sku"><span class="value">NB1042</span></div>
            </div>
        "#;
        let (record, _) = imp.parse_item_page(html, "https://shop/refill.html").unwrap();
        assert_eq!(record.unwrap().vendor_internal_id, "NB1042-refill");
    }

    #[test]
    fn gift_item_page_is_excluded_without_error() {
        let mut imp = importer();
        let html = r#"
            <div class="product-view">
              <div class="product-name">Christmas Gift Box</div>
            </div>
        "#;
        let (record, categories) = imp.parse_item_page(html, "https://shop/gift.html").unwrap();
        assert!(record.is_none());
        assert!(categories.is_empty());
        assert!(imp.failed.is_empty());
        assert!(imp.retrieved_ids.is_empty());
    }

    #[test]
    fn missing_sku_falls_back_to_link_stem() {
        let mut imp = importer();
        let html = r#"
            <div class="product-view">
              <div class="product-name">Mystery Tea</div>
            </div>
        "#;
        let (record, _) = imp.parse_item_page(html, "https://shop/mystery-tea.html").unwrap();
        assert_eq!(record.unwrap().vendor_internal_id, "mystery-tea");
    }
}
