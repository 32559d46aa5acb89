//! In-memory tabular dataset with CSV load and save.
//!
//! Cells keep the raw CSV text until a transform converts them, so columns
//! the pipeline does not touch are written back exactly as they were read.

use crate::error::{CleaningError, Result};
use chrono::{NaiveDateTime, Timelike};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_MICROS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the header.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(CleaningError::InvalidArtifact(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CleaningError::MissingColumn(name.to_string()))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    /// Keep the rows for which `keep` returns true, preserving order.
    pub(crate) fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);

        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Missing
                    } else {
                        Value::Text(field.to_string())
                    }
                })
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    /// Write with a header and no index column, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let formats: Vec<Option<&'static str>> = (0..self.columns.len())
            .map(|idx| self.datetime_format(idx))
            .collect();

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().zip(&formats).map(|(value, fmt)| match value {
                Value::Missing => String::new(),
                Value::Text(s) => s.clone(),
                Value::DateTime(dt) => dt.format(fmt.unwrap_or(DATETIME_FORMAT)).to_string(),
            }))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Pick one rendering for a whole datetime column: plain dates when every
    /// value sits at midnight, microseconds only when some value needs them.
    fn datetime_format(&self, idx: usize) -> Option<&'static str> {
        let mut any = false;
        let mut all_midnight = true;
        let mut any_fraction = false;
        for dt in self.rows.iter().filter_map(|row| row[idx].as_datetime()) {
            any = true;
            if dt.time().num_seconds_from_midnight() != 0 || dt.nanosecond() != 0 {
                all_midnight = false;
            }
            if dt.nanosecond() != 0 {
                any_fraction = true;
            }
        }
        if !any {
            None
        } else if all_midnight {
            Some(DATE_FORMAT)
        } else if any_fraction {
            Some(DATETIME_MICROS_FORMAT)
        } else {
            Some(DATETIME_FORMAT)
        }
    }
}
