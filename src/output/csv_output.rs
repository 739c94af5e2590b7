//! CSV record export
//!
//! A flat spreadsheet-friendly table: a header row of `url` followed by the
//! configured field names in declaration order, then one row per record.

use crate::config::FieldRule;
use crate::output::traits::{Exporter, OutputResult};
use crate::record::{FieldValue, Record};
use std::path::{Path, PathBuf};

/// Writes records as CSV rows
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
    columns: Vec<String>,
}

impl CsvExporter {
    pub fn new(path: impl AsRef<Path>, rules: &[FieldRule]) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns: rules.iter().map(|rule| rule.name.clone()).collect(),
        }
    }

    fn row(&self, record: &Record) -> Vec<String> {
        std::iter::once(record.url().to_string())
            .chain(self.columns.iter().map(|name| match record.get(name) {
                Some(FieldValue::Text(text)) => text.clone(),
                Some(FieldValue::Number(n)) => n.to_string(),
                None => String::new(),
            }))
            .collect()
    }
}

impl Exporter for CsvExporter {
    fn export(&self, records: &[Record]) -> OutputResult<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        let header = std::iter::once("url").chain(self.columns.iter().map(String::as_str));
        writer.write_record(header)?;
        for record in records {
            writer.write_record(self.row(record))?;
        }
        writer.flush()?;

        Ok(records.len())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}
