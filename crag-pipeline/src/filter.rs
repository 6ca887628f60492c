use std::collections::BTreeMap;

use crate::clean::NarrativeCleaner;
use crate::record::ComplaintRecord;

/// Canonical product categories targeted by the pipeline.
pub const DEFAULT_PRODUCTS: &[&str] = &[
    "Credit card",
    "Personal loan",
    "Savings account",
    "Money transfers",
];

/// Lowercased CFPB product names and the canonical category they fold into.
const PRODUCT_MAP: &[(&str, &str)] = &[
    ("credit card", "Credit card"),
    ("credit cards", "Credit card"),
    ("credit card or prepaid card", "Credit card"),
    ("prepaid card", "Credit card"),
    ("personal loan", "Personal loan"),
    ("personal loans", "Personal loan"),
    ("consumer loan", "Personal loan"),
    ("payday loan, title loan, or personal loan", "Personal loan"),
    ("payday loan", "Personal loan"),
    ("title loan", "Personal loan"),
    ("savings account", "Savings account"),
    ("checking or savings account", "Savings account"),
    ("checking account", "Savings account"),
    ("bank account or service", "Savings account"),
    ("money transfer, virtual currency, or money service", "Money transfers"),
    ("money transfer", "Money transfers"),
    ("money transfers", "Money transfers"),
    ("virtual currency", "Money transfers"),
];

/// Map a raw product name to its canonical category.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Canonical
/// names map to themselves.
pub fn canonical_product(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_lowercase();
    PRODUCT_MAP
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, canonical)| *canonical)
}

/// Row counts at each filtering stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub unmapped_product: usize,
    pub excluded_product: usize,
    pub empty_narrative: usize,
    pub empty_after_cleaning: usize,
    pub kept: usize,
    /// Raw product names that had no canonical mapping, with their counts.
    pub unmapped: BTreeMap<String, usize>,
}

/// Keep complaints whose product folds into one of `allowed` and whose raw
/// narrative is non-blank. Kept records carry the canonical product name.
pub fn filter_complaints(
    records: Vec<ComplaintRecord>,
    allowed: &[String],
    report: &mut FilterReport,
) -> Vec<ComplaintRecord> {
    report.input = records.len();
    let mut kept = Vec::with_capacity(records.len());

    for mut record in records {
        let Some(canonical) = canonical_product(&record.product_category) else {
            report.unmapped_product += 1;
            *report
                .unmapped
                .entry(record.product_category.trim().to_string())
                .or_insert(0) += 1;
            continue;
        };
        if !allowed.iter().any(|a| a == canonical) {
            report.excluded_product += 1;
            continue;
        }
        if record.raw_narrative.trim().is_empty() {
            report.empty_narrative += 1;
            continue;
        }
        record.product_category = canonical.to_string();
        kept.push(record);
    }

    report.kept = kept.len();
    kept
}

/// Fill `cleaned_narrative` for every record and drop those left empty.
pub fn apply_cleaning(
    records: Vec<ComplaintRecord>,
    cleaner: &NarrativeCleaner,
    report: &mut FilterReport,
) -> Vec<ComplaintRecord> {
    let mut kept = Vec::with_capacity(records.len());
    for mut record in records {
        record.cleaned_narrative = cleaner.clean(&record.raw_narrative);
        if record.cleaned_narrative.is_empty() {
            report.empty_after_cleaning += 1;
            continue;
        }
        kept.push(record);
    }
    report.kept = kept.len();
    kept
}
