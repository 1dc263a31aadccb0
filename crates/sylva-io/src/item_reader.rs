//! CSV item reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sylva_tree::{Item, Value};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads training or query items from a CSV file.
///
/// Expected CSV format:
/// - Header row required; each column name becomes an attribute name
/// - `colour,size,category`
/// - All rows must have the same number of columns as the header
///
/// Cells are trimmed. An empty cell leaves the attribute absent on that item.
/// A cell that parses as a finite float becomes [`Value::Number`]; any other
/// text becomes [`Value::Text`]. Words the float parser would read as NaN or
/// infinity (`nan`, `inf`, `Infinity`) stay text.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateHeader`] | Two columns share a name |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
pub struct ItemReader {
    path: PathBuf,
}

impl ItemReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning one [`Item`] per row.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<Item>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) allows rows with varying column counts so that our own
        // InconsistentRowLength check fires instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.parse_error(e))?;
        let columns: Vec<String> = header.iter().map(String::from).collect();
        debug!(n_columns = columns.len(), "read CSV header");

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (col, name) in columns.iter().enumerate() {
            if let Some(&first_col) = seen.get(name.as_str()) {
                return Err(IoError::DuplicateHeader {
                    path: self.path.clone(),
                    name: name.clone(),
                    first_col,
                    second_col: col,
                });
            }
            seen.insert(name, col);
        }

        let mut items = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.parse_error(e))?;

            if record.len() != columns.len() {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: columns.len(),
                    got: record.len(),
                });
            }

            let mut item = Item::new();
            for (column, raw) in columns.iter().zip(record.iter()) {
                if raw.is_empty() {
                    continue;
                }
                item.insert(column.as_str(), parse_cell(raw));
            }
            items.push(item);
        }

        if items.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_items = items.len(),
            n_columns = columns.len(),
            "items loaded"
        );

        Ok(items)
    }

    fn parse_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

fn parse_cell(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_items() {
        let csv = "colour,size,category\nred,1.5,apple\nyellow,20,banana\n";
        let f = write_csv(csv);
        let items = ItemReader::new(f.path()).read().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("colour"), Some(&Value::from("red")));
        assert_eq!(items[0].get("size"), Some(&Value::from(1.5)));
        assert_eq!(items[1].get("size"), Some(&Value::from(20)));
        let names: Vec<&str> = items[1].attributes().map(|(n, _)| n).collect();
        assert_eq!(names, ["colour", "size", "category"]);
    }

    #[test]
    fn empty_cell_is_absent() {
        let csv = "x,y,category\n1,,A\n, 2 ,B\n";
        let f = write_csv(csv);
        let items = ItemReader::new(f.path()).read().unwrap();
        assert!(items[0].get("y").is_none());
        assert_eq!(items[0].len(), 2);
        assert!(items[1].get("x").is_none());
        assert_eq!(items[1].get("y"), Some(&Value::from(2)));
    }

    #[test]
    fn empty_dataset_error() {
        let f = write_csv("x,category\n");
        let err = ItemReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn duplicate_header_error() {
        let f = write_csv("x,x,category\n1,2,A\n");
        let err = ItemReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::DuplicateHeader {
                first_col: 0,
                second_col: 1,
                ..
            }
        ));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let f = write_csv("x,y,category\n1,2,A\n3,B\n");
        let err = ItemReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, .. }
        ));
    }

    #[test]
    fn non_finite_words_stay_text() {
        let f = write_csv("name,x,category\nNan,inf,A\nInfinity,-1e3,B\n");
        let items = ItemReader::new(f.path()).read().unwrap();
        assert_eq!(items[0].get("name"), Some(&Value::from("Nan")));
        assert_eq!(items[0].get("x"), Some(&Value::from("inf")));
        assert_eq!(items[1].get("name"), Some(&Value::from("Infinity")));
        assert_eq!(items[1].get("x"), Some(&Value::from(-1000.0)));
    }

    #[test]
    fn missing_file_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ItemReader::new(&dir.path().join("absent.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
