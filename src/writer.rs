//! Rotating CSV writer.
//!
//! Writes rows into `<stem>_<n>.csv` files and moves on to the next free
//! index once a file holds the configured number of rows. Every file starts
//! with the same header.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::filter::OutputRow;

/// Column header written at the top of every export file.
pub const HEADER: [&str; 9] = [
    "Kunde ID",
    "Kunde Name",
    "Record Type",
    "FQDN",
    "Name",
    "Domain Name",
    "Data",
    "TTL",
    "Tags",
];

const CSV_EXTENSION: &str = ".csv";

/// Builds `<stem>_<index>.csv` from a base filename such as `export.csv`.
pub fn numbered_filename(base_filename: &str, index: u32) -> String {
    let stem = base_filename
        .strip_suffix(CSV_EXTENSION)
        .unwrap_or(base_filename);
    format!("{stem}_{index}{CSV_EXTENSION}")
}

/// First index `>= start` whose numbered file does not exist in `dir`.
pub fn next_free_index(dir: &Path, base_filename: &str, start: u32) -> u32 {
    let mut index = start.max(1);
    while dir.join(numbered_filename(base_filename, index)).exists() {
        index += 1;
    }
    index
}

/// A finished export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    /// Data rows, header excluded.
    pub rows: u64,
}

impl ExportedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Owns the open export file for the duration of a run.
///
/// Dropping the rotator releases the file handle, so error paths never leak
/// it. Call [`CsvRotator::finish`] on success to flush and collect results.
pub struct CsvRotator {
    dir: PathBuf,
    base_filename: String,
    index: u32,
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
    finished: Vec<ExportedFile>,
}

impl CsvRotator {
    /// Create the first file at the next free index `>= start_index`.
    pub fn open(dir: &Path, base_filename: &str, start_index: u32) -> Result<Self> {
        let index = next_free_index(dir, base_filename, start_index);
        let path = dir.join(numbered_filename(base_filename, index));
        let writer = create_with_header(&path)?;

        info!(path = %path.display(), "📄 Opened export file");

        Ok(Self {
            dir: dir.to_path_buf(),
            base_filename: base_filename.to_string(),
            index,
            path,
            writer,
            rows: 0,
            finished: Vec::new(),
        })
    }

    pub fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        self.writer
            .write_record(row.fields())
            .map_err(|source| ExportError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.rows += 1;
        Ok(())
    }

    /// Rotate once the current file holds `max_rows` rows.
    ///
    /// Returns whether a new file was opened.
    pub fn rotate_if_needed(&mut self, max_rows: u64) -> Result<bool> {
        if self.rows < max_rows {
            return Ok(false);
        }

        info!(
            rows = self.rows,
            path = %self.path.display(),
            "Row limit reached, starting new file"
        );

        self.flush()?;

        let index = next_free_index(&self.dir, &self.base_filename, self.index + 1);
        let path = self.dir.join(numbered_filename(&self.base_filename, index));
        let writer = create_with_header(&path)?;

        // Replacing the writer drops and closes the previous file.
        let previous = std::mem::replace(&mut self.path, path);
        self.writer = writer;
        self.finished.push(ExportedFile {
            path: previous,
            rows: self.rows,
        });
        self.index = index;
        self.rows = 0;

        debug!(path = %self.path.display(), "Opened rotated export file");
        Ok(true)
    }

    /// Flush and close the current file, returning every file written.
    pub fn finish(mut self) -> Result<Vec<ExportedFile>> {
        self.flush()?;
        self.finished.push(ExportedFile {
            path: self.path,
            rows: self.rows,
        });
        Ok(self.finished)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn create_with_header(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(file);

    writer
        .write_record(HEADER)
        .map_err(|source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(n: usize) -> OutputRow {
        OutputRow {
            customer_id: "1".to_string(),
            customer_name: "Muster, GmbH".to_string(),
            record_type: "A".to_string(),
            fqdn: format!("host{n}.example.de"),
            name: format!("host{n}"),
            domain: "example.de".to_string(),
            data: format!("192.0.2.{n}"),
            ttl: "300".to_string(),
            tags: String::new(),
        }
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).expect("Failed to open export file");
        let headers = reader
            .headers()
            .expect("Failed to read headers")
            .iter()
            .map(str::to_string)
            .collect();
        let records = reader
            .records()
            .map(|r| r.expect("Failed to read record").iter().map(str::to_string).collect())
            .collect();
        (headers, records)
    }

    #[test]
    fn test_numbered_filename() {
        assert_eq!(numbered_filename("export.csv", 1), "export_1.csv");
        assert_eq!(numbered_filename("export", 3), "export_3.csv");
        assert_eq!(numbered_filename("a.csv.csv", 2), "a.csv_2.csv");
    }

    #[test]
    fn test_next_free_index_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("export_1.csv"), "").unwrap();
        fs::write(dir.path().join("export_2.csv"), "").unwrap();
        fs::write(dir.path().join("export_4.csv"), "").unwrap();

        assert_eq!(next_free_index(dir.path(), "export.csv", 1), 3);
        assert_eq!(next_free_index(dir.path(), "export.csv", 4), 5);
        assert_eq!(next_free_index(dir.path(), "other.csv", 0), 1);
    }

    #[test]
    fn test_open_writes_header() {
        let dir = TempDir::new().unwrap();
        let rotator = CsvRotator::open(dir.path(), "export.csv", 1).unwrap();
        let files = rotator.finish().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rows, 0);
        assert_eq!(files[0].file_name(), "export_1.csv");

        let content = fs::read_to_string(&files[0].path).unwrap();
        assert_eq!(
            content,
            "\"Kunde ID\",\"Kunde Name\",\"Record Type\",\"FQDN\",\"Name\",\"Domain Name\",\"Data\",\"TTL\",\"Tags\"\n"
        );
    }

    #[test]
    fn test_rotation_after_exactly_max_rows() {
        let dir = TempDir::new().unwrap();
        let mut rotator = CsvRotator::open(dir.path(), "export.csv", 1).unwrap();

        for n in 0..3 {
            rotator.write_row(&row(n)).unwrap();
            let rotated = rotator.rotate_if_needed(3).unwrap();
            assert_eq!(rotated, n == 2);
        }
        assert_eq!(rotator.rows, 0);
        assert!(rotator.path.ends_with("export_2.csv"));

        rotator.write_row(&row(3)).unwrap();
        let files = rotator.finish().unwrap();

        assert_eq!(files.iter().map(|f| f.rows).collect::<Vec<_>>(), vec![3, 1]);
        for file in &files {
            let (headers, _) = read_rows(&file.path);
            assert_eq!(headers, HEADER);
        }

        let (_, records) = read_rows(&files[0].path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0][1], "Muster, GmbH");
        assert_eq!(records[2][6], "192.0.2.2");
    }

    #[test]
    fn test_rotation_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("export_2.csv"), "keep me").unwrap();

        let mut rotator = CsvRotator::open(dir.path(), "export.csv", 1).unwrap();
        rotator.write_row(&row(0)).unwrap();
        rotator.rotate_if_needed(1).unwrap();
        let files = rotator.finish().unwrap();

        assert_eq!(files[1].file_name(), "export_3.csv");
        assert_eq!(
            fs::read_to_string(dir.path().join("export_2.csv")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = CsvRotator::open(&missing, "export.csv", 1).err().unwrap();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
