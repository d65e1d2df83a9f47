//! The closed tea taxonomy.
//!
//! Categories are a fixed table shared by every vendor: tea types (black,
//! green, ...) and geographic origins. Importers classify teas against this
//! table by keyword; the pipeline get-or-creates the matching database rows
//! once per run.

/// One entry of the category table.
#[derive(Debug, PartialEq, Eq)]
pub struct CategoryDef {
    /// Display name
    pub name: &'static str,

    /// URL-safe identifier, unique across categories
    pub slug: &'static str,

    /// Geographic origin rather than a tea type
    pub is_origin: bool,

    /// Case-insensitive keywords matched against page text
    pub keywords: &'static [&'static str],
}

/// The full taxonomy, in display order.
///
/// Keyword lists mix French and English because the vendors do.
pub static CATEGORIES: &[CategoryDef] = &[
    CategoryDef {
        name: "Thé noir",
        slug: "noir",
        is_origin: false,
        keywords: &["Thé noir", "Black Tea"],
    },
    CategoryDef {
        name: "Thé vert",
        slug: "vert",
        is_origin: false,
        keywords: &["Thé vert", "Green Tea"],
    },
    CategoryDef {
        name: "Thé blanc",
        slug: "blanc",
        is_origin: false,
        keywords: &["Thé blanc"],
    },
    CategoryDef {
        name: "Thé mûr",
        slug: "mur",
        is_origin: false,
        keywords: &["Thé mûr", "Thé mur", "Pu-erh", "Puerh", "Pu Erh"],
    },
    CategoryDef {
        name: "Thé Oolong",
        slug: "oolong",
        is_origin: false,
        keywords: &["Oolong"],
    },
    CategoryDef {
        name: "Thé jaune",
        slug: "jaune",
        is_origin: false,
        keywords: &["Thé jaune"],
    },
    CategoryDef {
        name: "Thé bleu",
        slug: "bleu",
        is_origin: false,
        keywords: &["Thé bleu"],
    },
    CategoryDef {
        name: "Thé rouge",
        slug: "rouge",
        is_origin: false,
        keywords: &["Thé rouge", "Thé rouge sans théine", "sans théine", "Rooibos"],
    },
    CategoryDef {
        name: "Thé fûmé",
        slug: "fume",
        is_origin: false,
        keywords: &["Thé fûmé", "Thé fumé"],
    },
    CategoryDef {
        name: "Thé au Jasmin",
        slug: "jasmin",
        is_origin: false,
        keywords: &["Thé au jasmin", "Jasmin", "Jasmine"],
    },
    CategoryDef {
        name: "Infusion",
        slug: "infusion",
        is_origin: false,
        keywords: &["Infusion", "Infusion de fruits"],
    },
    CategoryDef {
        name: "Grand cru",
        slug: "grand-cru",
        is_origin: false,
        keywords: &["Grand cru"],
    },
    CategoryDef {
        name: "Darjeeling",
        slug: "darjeeling",
        is_origin: true,
        keywords: &["Darjeeling"],
    },
    CategoryDef {
        name: "Assam",
        slug: "assam",
        is_origin: true,
        keywords: &["Assam", "Assam d'Été"],
    },
    CategoryDef {
        name: "Ceylan",
        slug: "ceylan",
        is_origin: true,
        keywords: &["Ceylan"],
    },
    CategoryDef {
        name: "Thé de Chine",
        slug: "chine",
        is_origin: true,
        keywords: &["Chine"],
    },
    CategoryDef {
        name: "Thé du Japon",
        slug: "japon",
        is_origin: true,
        keywords: &["Japon"],
    },
];
