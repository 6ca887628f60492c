use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::record::ComplaintRecord;

const ID_ALIASES: &[&str] = &["Complaint ID", "complaint_id", "id"];
const PRODUCT_ALIASES: &[&str] = &["Product", "product", "product_category"];
const NARRATIVE_ALIASES: &[&str] = &[
    "Consumer complaint narrative",
    "complaint_narrative",
    "narrative",
    "raw_narrative",
];
const CLEANED_ALIASES: &[&str] = &["cleaned_narrative"];
const COMPANY_ALIASES: &[&str] = &["Company", "company"];
const STATE_ALIASES: &[&str] = &["State", "state"];
const ISSUE_ALIASES: &[&str] = &["Issue", "issue"];

/// Header written by [`write_cleaned_csv`].
pub const CLEANED_HEADER: &[&str] = &[
    "complaint_id",
    "product",
    "issue",
    "company",
    "state",
    "consumer_complaint_narrative",
    "cleaned_narrative",
];

/// Column names compare case-insensitively, with `_` and space treated alike.
fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace('_', " ")
}

fn find_column<'a, I>(headers: I, aliases: &[&str]) -> Option<usize>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    aliases.iter().find_map(|alias| {
        let want = normalize_header(alias);
        headers
            .clone()
            .into_iter()
            .position(|h| normalize_header(h) == want)
    })
}

/// Positions of the known columns within a header row.
struct ColumnMap {
    id: Option<usize>,
    product: usize,
    narrative: usize,
    cleaned: Option<usize>,
    company: Option<usize>,
    state: Option<usize>,
    issue: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String], path: &Path) -> Result<Self> {
        let names = headers.iter().map(String::as_str);
        let required = |aliases: &[&str], column: &str| {
            find_column(names.clone(), aliases).ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_string(),
                path: path.display().to_string(),
            })
        };
        Ok(Self {
            id: find_column(names.clone(), ID_ALIASES),
            product: required(PRODUCT_ALIASES, "product")?,
            narrative: required(NARRATIVE_ALIASES, "narrative")?,
            cleaned: find_column(names.clone(), CLEANED_ALIASES),
            company: find_column(names.clone(), COMPANY_ALIASES),
            state: find_column(names.clone(), STATE_ALIASES),
            issue: find_column(names.clone(), ISSUE_ALIASES),
        })
    }

    /// Build a record from field values aligned with the header. `row` is 1-based.
    fn record(&self, fields: &[String], row: usize) -> ComplaintRecord {
        let get = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let id = get(self.id).unwrap_or_else(|| row.to_string());
        let mut record = ComplaintRecord::new(
            id,
            get(Some(self.product)).unwrap_or_default(),
            fields.get(self.narrative).cloned().unwrap_or_default(),
        );
        record.cleaned_narrative = get(self.cleaned).unwrap_or_default();
        record.company = get(self.company);
        record.state = get(self.state);
        record.issue = get(self.issue);
        record
    }
}

/// Load complaints from a `.csv` file or a `.json` array of objects.
pub fn load_complaints(path: &Path) -> Result<Vec<ComplaintRecord>> {
    if !path.is_file() {
        return Err(PipelineError::NotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let records = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        _ => return Err(PipelineError::UnsupportedFormat(path.display().to_string())),
    };
    tracing::info!(path = %path.display(), rows = records.len(), "Loaded complaints");
    Ok(records)
}

fn load_csv(path: &Path) -> Result<Vec<ComplaintRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(File::open(path)?));
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = ColumnMap::resolve(&headers, path)?;

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let fields: Vec<String> = row.iter().map(str::to_string).collect();
        records.push(columns.record(&fields, i + 1));
    }
    Ok(records)
}

fn load_json(path: &Path) -> Result<Vec<ComplaintRecord>> {
    let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let Value::Array(rows) = value else {
        return Err(PipelineError::Malformed(format!(
            "{}: expected a JSON array of objects",
            path.display()
        )));
    };

    // Header is the union of keys in first-seen order.
    let mut headers: Vec<String> = Vec::new();
    for row in &rows {
        let Value::Object(map) = row else {
            return Err(PipelineError::Malformed(format!(
                "{}: array element is not an object",
                path.display()
            )));
        };
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    let columns = ColumnMap::resolve(&headers, path)?;

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let fields: Vec<String> = headers
                .iter()
                .map(|h| match row.get(h) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect();
            columns.record(&fields, i + 1)
        })
        .collect();
    Ok(records)
}

/// Write the cleaned dataset as CSV, creating parent directories.
pub fn write_cleaned_csv(path: &Path, records: &[ComplaintRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CLEANED_HEADER)?;
    for r in records {
        writer.write_record([
            r.id.as_str(),
            r.product_category.as_str(),
            r.issue.as_deref().unwrap_or(""),
            r.company.as_deref().unwrap_or(""),
            r.state.as_deref().unwrap_or(""),
            r.raw_narrative.as_str(),
            r.cleaned_narrative.as_str(),
        ])?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = records.len(), "Wrote cleaned dataset");
    Ok(())
}

/// Per-category counts, largest first, ties by name.
pub fn product_distribution(records: &[ComplaintRecord]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.product_category.as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_cfpb_style_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "raw.csv",
            "Date received,Product,Issue,Consumer complaint narrative,Company,State,Complaint ID\n\
             2023-01-01,Credit card,Billing dispute,\"I was charged, twice\",Big Bank,CA,101\n\
             2023-01-02,Mortgage,Escrow,,Home Co,,102\n",
        );
        let records = load_complaints(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "101");
        assert_eq!(records[0].product_category, "Credit card");
        assert_eq!(records[0].raw_narrative, "I was charged, twice");
        assert_eq!(records[0].issue.as_deref(), Some("Billing dispute"));
        assert_eq!(records[0].company.as_deref(), Some("Big Bank"));
        assert_eq!(records[1].state, None);
        assert_eq!(records[1].raw_narrative, "");
    }

    #[test]
    fn id_falls_back_to_row_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "PRODUCT,narrative\nCredit card,a\nCredit card,b\n");
        let records = load_complaints(&path).unwrap();
        assert_eq!(records[0].id, "1");
        assert_eq!(records[1].id, "2");
    }

    #[test]
    fn loads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "a.json",
            r#"[{"complaint_id": 7, "product_category": "Personal loan", "raw_narrative": "late fee"},
                {"complaint_id": 8, "product_category": "Savings account", "raw_narrative": null}]"#,
        );
        let records = load_complaints(&path).unwrap();
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].raw_narrative, "late fee");
        assert_eq!(records[1].raw_narrative, "");
    }

    #[test]
    fn missing_file_and_column_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_complaints(&dir.path().join("nope.csv")).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let path = write(dir.path(), "b.csv", "Product,Issue\nCredit card,x\n");
        match load_complaints(&path).unwrap_err() {
            PipelineError::MissingColumn { column, .. } => assert_eq!(column, "narrative"),
            other => panic!("unexpected error: {other}"),
        }

        let path = write(dir.path(), "c.parquet", "");
        assert_eq!(load_complaints(&path).unwrap_err().code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn cleaned_csv_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = ComplaintRecord::new("5", "Credit card", "My CARD, declined");
        r.cleaned_narrative = "my card, declined".into();
        r.issue = Some("Fraud".into());
        let path = dir.path().join("nested/out/clean.csv");
        write_cleaned_csv(&path, &[r.clone()]).unwrap();

        let back = load_complaints(&path).unwrap();
        assert_eq!(back, vec![r]);
    }

    #[test]
    fn distribution_sorts_by_count_then_name() {
        let records = vec![
            ComplaintRecord::new("1", "b", ""),
            ComplaintRecord::new("2", "a", ""),
            ComplaintRecord::new("3", "c", ""),
            ComplaintRecord::new("4", "c", ""),
        ];
        assert_eq!(
            product_distribution(&records),
            vec![("c".to_string(), 2), ("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }
}
