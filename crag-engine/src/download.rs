use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;
use ureq::Agent;

use crate::error::{EngineError, Result};

/// Public CFPB consumer complaint export.
pub const DEFAULT_DATASET_URL: &str = "https://files.consumerfinance.gov/ccdb/complaints.csv.zip";

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// What ended up at the output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub bytes_downloaded: u64,
    /// Archive entry that was extracted, if the payload was a zip.
    pub extracted_entry: Option<String>,
}

/// Fetch the complaint export from `url` and leave a plain CSV at `output`.
pub fn download_dataset(url: &str, output: &Path) -> Result<DownloadReport> {
    let dir = parent_dir(output);
    std::fs::create_dir_all(dir)?;

    tracing::info!(url, "Downloading complaint dataset");
    let agent = Agent::new_with_config(
        Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .build(),
    );
    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| EngineError::Download(format!("GET {url} failed: {e}")))?;

    let mut staging = NamedTempFile::new_in(dir)?;
    let bytes_downloaded = io::copy(&mut response.body_mut().as_reader(), staging.as_file_mut())?;
    tracing::info!(bytes = bytes_downloaded, "Download complete");

    let extracted_entry = finalize_download(staging, output)?;
    Ok(DownloadReport {
        bytes_downloaded,
        extracted_entry,
    })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn is_zip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == ZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Move a downloaded payload into place, extracting it first when it is a zip.
/// Returns the extracted entry name.
pub fn finalize_download(staging: NamedTempFile, output: &Path) -> Result<Option<String>> {
    if is_zip(staging.path())? {
        tracing::info!("Payload is a zip archive, extracting");
        let entry = extract_first_csv(staging.path(), output)?;
        Ok(Some(entry))
    } else {
        staging
            .persist(output)
            .map_err(|e| EngineError::Io(e.error))?;
        Ok(None)
    }
}

/// Extract the first `.csv` entry of `archive` to `output`.
pub fn extract_first_csv(archive: &Path, output: &Path) -> Result<String> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)
        .map_err(|e| EngineError::Download(format!("invalid zip archive: {e}")))?;

    let index = (0..zip.len())
        .find(|&i| {
            zip.name_for_index(i)
                .is_some_and(|n| n.to_ascii_lowercase().ends_with(".csv"))
        })
        .ok_or_else(|| EngineError::Download("zip archive contains no .csv file".into()))?;

    let mut entry = zip
        .by_index(index)
        .map_err(|e| EngineError::Download(format!("cannot read archive entry {index}: {e}")))?;
    let name = entry.name().to_string();

    let mut staging = NamedTempFile::new_in(parent_dir(output))?;
    let bytes = io::copy(&mut entry, staging.as_file_mut())?;
    staging
        .persist(output)
        .map_err(|e| EngineError::Io(e.error))?;

    tracing::info!(entry = %name, bytes, output = %output.display(), "Extracted dataset");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_first_csv_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("complaints.csv.zip");
        write_zip(
            &archive,
            &[("README.txt", "ignore me"), ("complaints.csv", "Product\nCredit card\n")],
        );
        let output = dir.path().join("complaints.csv");
        let name = extract_first_csv(&archive, &output).unwrap();
        assert_eq!(name, "complaints.csv");
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Product\nCredit card\n");
    }

    #[test]
    fn archive_without_csv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("notes.txt", "x")]);
        let err = extract_first_csv(&archive, &dir.path().join("out.csv")).unwrap_err();
        assert_eq!(err.code(), "DOWNLOAD_ERROR");
    }

    #[test]
    fn plain_csv_payload_is_moved_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut staging = NamedTempFile::new_in(dir.path()).unwrap();
        staging.write_all(b"Product,Issue\n").unwrap();
        let output = dir.path().join("raw.csv");

        assert_eq!(finalize_download(staging, &output).unwrap(), None);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Product,Issue\n");
    }

    #[test]
    fn zip_payload_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let staging = NamedTempFile::new_in(dir.path()).unwrap();
        write_zip(staging.path(), &[("data/complaints.CSV", "a,b\n")]);
        let output = dir.path().join("raw.csv");

        let entry = finalize_download(staging, &output).unwrap();
        assert_eq!(entry.as_deref(), Some("data/complaints.CSV"));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "a,b\n");
    }
}
