//! Minimal tabular file support for the interim and master stores.
//!
//! The dialect is deliberately narrow: a header row, every field quoted on
//! output, doubled quotes as the escape, and LF row separators. The reader
//! also tolerates unquoted fields and CRLF so hand-edited inputs survive.

use std::path::Path;

use crate::errors::IngestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table with every field quoted, header first.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_row(&mut out, &self.columns);
        for row in &self.rows {
            write_row(&mut out, row);
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }

    /// Parse a tabular file written by [`Table::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Integrity(format!("unreadable table {}: {}", path.display(), e))
        })?;
        let mut records = parse_csv(&content)
            .map_err(|e| IngestError::Integrity(format!("{}: {}", path.display(), e)))?;
        if records.is_empty() {
            return Err(IngestError::Integrity(format!(
                "table {} has no header row",
                path.display()
            )));
        }
        let columns = records.remove(0);
        for (idx, row) in records.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(IngestError::Integrity(format!(
                    "table {} row {} has {} fields, header has {}",
                    path.display(),
                    idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            columns,
            rows: records,
        })
    }
}

fn write_row(out: &mut String, fields: &[impl AsRef<str>]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        for ch in field.as_ref().chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    }
    out.push('\n');
}

fn parse_csv(input: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
        } else {
            match ch {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut row));
                }
                _ => field.push(ch),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        records.push(row);
    }
    Ok(records)
}
