//! Output sinks for the extracted item list
//!
//! Two projections of the same list: a raw JSON dump of everything the
//! endpoint returned, and a six-column CSV of the fields people actually
//! read in a spreadsheet.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::domain::item::ItemRecord;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize item list: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Write the full structured dump as a single JSON document.
pub fn write_raw(path: &Path, items: &[ItemRecord]) -> Result<(), ExportError> {
    let json = serde_json::to_string(items)?;
    std::fs::write(path, json).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!("Wrote {} items to {}", items.len(), path.display());
    Ok(())
}

/// Write the tabular projection: authors, title, ASIN, order URL, product
/// image URL, acquired date. Every value is quoted with embedded quotes
/// doubled; rows are newline terminated.
pub fn write_table(path: &Path, items: &[ItemRecord]) -> Result<(), ExportError> {
    let mut out = String::from(
        "\"Authors\", \"Title\", \"ASIN\", \"Order URL\", \"Product Image\", \"Acquired Date\"\n",
    );

    for item in items {
        let values = [
            item.authors.as_str(),
            item.title.as_str(),
            item.asin.as_str(),
            item.order_detail_url.as_str(),
            item.product_image.as_str(),
            item.acquired_date.as_str(),
        ];
        let mut first = true;
        for value in values {
            if !first {
                out.push(',');
            }
            first = false;
            out.push('"');
            out.push_str(&value.replace('"', "\"\""));
            out.push('"');
        }
        out.push('\n');
    }

    std::fs::write(path, out).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!("Wrote {} rows to {}", items.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn item(title: &str) -> ItemRecord {
        ItemRecord {
            authors: "Doe, Jane".to_string(),
            title: title.to_string(),
            asin: "B0TEST0001".to_string(),
            order_detail_url: "https://example.invalid/o/1".to_string(),
            product_image: "https://example.invalid/i/1.jpg".to_string(),
            acquired_date: "June 6, 2013".to_string(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn table_has_header_and_quoted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_table(&path, &[item("Plain Title")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\"Authors\", \"Title\", \"ASIN\", \"Order URL\", \"Product Image\", \"Acquired Date\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Doe, Jane\",\"Plain Title\",\"B0TEST0001\",\"https://example.invalid/o/1\",\"https://example.invalid/i/1.jpg\",\"June 6, 2013\""
        );
    }

    #[test]
    fn embedded_quotes_are_doubled_within_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_table(&path, &[item(r#"The "Best" Book"#)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""The ""Best"" Book""#));
        // Still six columns: five quote-to-quote separators.
        let row = content.lines().nth(1).unwrap();
        assert_eq!(row.matches("\",\"").count(), 5);
    }

    #[test]
    fn raw_dump_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let items = vec![item("One"), item("Two")];
        write_raw(&path, &items).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ItemRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, items);
    }
}
