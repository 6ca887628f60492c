use std::collections::BTreeMap;
use std::path::Path;

use crag_pipeline::dataset::{load_complaints, product_distribution, write_cleaned_csv};
use crag_pipeline::filter::{apply_cleaning, filter_complaints, DEFAULT_PRODUCTS};
use crag_pipeline::{
    chunk_records, stratified_sample, ChunkerConfig, FilterReport, NarrativeCleaner,
    SampleOptions, TextChunker,
};

/// 100 complaints: 63 credit card, 37 personal loan.
fn write_fixture(path: &Path) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record(["Complaint ID", "Product", "Issue", "Consumer complaint narrative"])
        .unwrap();
    for i in 0..100 {
        let (product, issue) = if i < 63 {
            ("Credit card or prepaid card", "Billing dispute")
        } else {
            ("Payday loan, title loan, or personal loan", "Late fee")
        };
        let narrative = format!(
            "Dear Sir or Madam, on XX/XX/XXXX complaint number {i} was filed. \
             The company charged me ${i}.00 without notice.\n\nI contacted them at help@bank.com \
             and nothing happened. Please review my account history."
        );
        writer
            .write_record([format!("C{i:03}"), product.into(), issue.into(), narrative])
            .unwrap();
    }
    writer.flush().unwrap();
}

fn cleaned_fixture(dir: &Path) -> Vec<crag_pipeline::ComplaintRecord> {
    let raw = dir.join("raw.csv");
    write_fixture(&raw);
    let allowed: Vec<String> = DEFAULT_PRODUCTS.iter().map(|s| s.to_string()).collect();
    let mut report = FilterReport::default();
    let records = load_complaints(&raw).unwrap();
    let records = filter_complaints(records, &allowed, &mut report);
    let cleaner = NarrativeCleaner::new().unwrap();
    apply_cleaning(records, &cleaner, &mut report)
}

#[test]
fn preprocessing_keeps_all_mapped_rows() {
    let dir = tempfile::tempdir().unwrap();
    let records = cleaned_fixture(dir.path());
    assert_eq!(records.len(), 100);
    assert_eq!(
        product_distribution(&records),
        vec![("Credit card".to_string(), 63), ("Personal loan".to_string(), 37)]
    );
    assert!(records[0].cleaned_narrative.starts_with(", on complaint number 0 was filed."));
    assert!(!records[0].cleaned_narrative.contains("help@bank.com"));

    let out = dir.path().join("processed/filtered_complaints.csv");
    write_cleaned_csv(&out, &records).unwrap();
    assert_eq!(load_complaints(&out).unwrap(), records);
}

#[test]
fn sample_of_twenty_is_proportional() {
    let dir = tempfile::tempdir().unwrap();
    let records = cleaned_fixture(dir.path());

    let options = SampleOptions { target: 20, ..SampleOptions::default() };
    let (sample, _) = stratified_sample(&records, |r| r.product_category.as_str(), &options);
    assert_eq!(sample.len(), 20);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &sample {
        *counts.entry(r.product_category.as_str()).or_insert(0) += 1;
    }
    for (category, exact) in [("Credit card", 12.6), ("Personal loan", 7.4)] {
        let got = counts.get(category).copied().unwrap_or(0) as f64;
        assert!((got - exact).abs() <= 1.0, "{category}: {got} vs {exact}");
    }

    let mut ids: Vec<&str> = sample.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[test]
fn sampled_rows_chunk_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let records = cleaned_fixture(dir.path());
    let options = SampleOptions { target: 20, ..SampleOptions::default() };
    let (sample, _) = stratified_sample(&records, |r| r.product_category.as_str(), &options);

    let config = ChunkerConfig { max_chunk_length: 64, overlap_length: 12, ..ChunkerConfig::default() };
    let chunker = TextChunker::new(config).unwrap();
    let chunks = chunk_records(&sample, &chunker);
    assert!(chunks.len() > sample.len());

    for record in &sample {
        let own: Vec<_> = chunks.iter().filter(|c| c.source_id == record.id).collect();
        let mut rebuilt = String::new();
        for (i, c) in own.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, own.len());
            assert_eq!(c.product_category, record.product_category);
            assert!(c.text.chars().count() <= 64);
            if i == 0 {
                rebuilt.push_str(&c.text);
            } else {
                rebuilt.extend(c.text.chars().skip(12));
            }
        }
        assert_eq!(rebuilt, record.cleaned_narrative);
    }
}
