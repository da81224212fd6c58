//! Keyed numeric tables: the tabular output of every stage.

use crate::domain::model::YearMonth;
use crate::utils::error::{RechargeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::str::FromStr;

pub trait TableKey: Ord + Copy + fmt::Display + fmt::Debug {}

impl<T: Ord + Copy + fmt::Display + fmt::Debug> TableKey for T {}

#[derive(Debug, Clone, PartialEq)]
pub struct Row<K> {
    pub key: K,
    pub values: Vec<Option<f64>>,
}

/// Rows sorted by strictly increasing key; one value slot per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<K> {
    columns: Vec<String>,
    rows: Vec<Row<K>>,
}

pub type MonthlyTable = Table<YearMonth>;
pub type AnnualTable = Table<i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
}

impl Aggregation {
    /// Missing values are skipped; all-missing stays missing.
    pub fn apply(self, values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
        let present: Vec<f64> = values.into_iter().flatten().collect();
        if present.is_empty() {
            return None;
        }
        let total: f64 = present.iter().sum();
        match self {
            Aggregation::Sum => Some(total),
            Aggregation::Mean => Some(total / present.len() as f64),
        }
    }
}

impl<K: TableKey> Table<K> {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(RechargeError::validation(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row<K>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.rows.iter().map(|r| r.key).collect()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RechargeError::validation(format!("table has no column '{}'", name)))
    }

    pub fn push_row(&mut self, key: K, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(RechargeError::validation(format!(
                "row {} has {} values for {} columns",
                key,
                values.len(),
                self.columns.len()
            )));
        }
        if let Some(last) = self.rows.last() {
            if last.key >= key {
                return Err(RechargeError::validation(format!(
                    "row {} does not follow {}",
                    key, last.key
                )));
            }
        }
        self.rows.push(Row { key, values });
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, key: &K, name: &str) -> Result<Option<f64>> {
        let idx = self.column_index(name)?;
        let pos = self
            .rows
            .binary_search_by(|r| r.key.cmp(key))
            .map_err(|_| RechargeError::validation(format!("table has no row {}", key)))?;
        Ok(self.rows[pos].values[idx])
    }

    /// New table with `values` appended as column `name`.
    pub fn with_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(RechargeError::validation(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let mut table = Table::new(columns)?;
        for (row, value) in self.rows.iter().zip(values) {
            let mut row_values = row.values.clone();
            row_values.push(value);
            table.push_row(row.key, row_values)?;
        }
        Ok(table)
    }

    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        let idx = self.column_index(from)?;
        let mut columns = self.columns.clone();
        columns[idx] = to.to_string();
        let mut table = Table::new(columns)?;
        table.rows = self.rows.clone();
        Ok(table)
    }

    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>>>()?;
        let mut table = Table::new(names.iter().map(|n| n.to_string()).collect())?;
        for row in &self.rows {
            table.push_row(row.key, indices.iter().map(|&i| row.values[i]).collect())?;
        }
        Ok(table)
    }

    /// Inner join on the key. Rows without a match on either side are dropped.
    pub fn merge(&self, other: &Table<K>) -> Result<Self> {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        let mut table = Table::new(columns)?;

        let (mut i, mut j) = (0, 0);
        while i < self.rows.len() && j < other.rows.len() {
            let (left, right) = (&self.rows[i], &other.rows[j]);
            match left.key.cmp(&right.key) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let mut values = left.values.clone();
                    values.extend(right.values.iter().copied());
                    table.push_row(left.key, values)?;
                    i += 1;
                    j += 1;
                }
            }
        }

        let dropped = self.rows.len() + other.rows.len() - 2 * table.rows.len();
        if dropped > 0 {
            tracing::debug!("Merge dropped {} unmatched rows", dropped);
        }
        Ok(table)
    }

    /// Aggregates every column over the rows sharing `group(key)`.
    pub fn group_by<G: TableKey>(&self, group: impl Fn(&K) -> G, agg: Aggregation) -> Result<Table<G>> {
        let mut groups: BTreeMap<G, Vec<&Row<K>>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(group(&row.key)).or_default().push(row);
        }

        let mut table = Table::new(self.columns.clone())?;
        for (key, rows) in groups {
            let values = (0..self.columns.len())
                .map(|c| agg.apply(rows.iter().map(|r| r.values[c])))
                .collect();
            table.push_row(key, values)?;
        }
        Ok(table)
    }

    pub fn mean_of_column(&self, name: &str) -> Result<Option<f64>> {
        Ok(Aggregation::Mean.apply(self.column(name)?))
    }

    /// Writes a header of `key_header` plus the column names; missing cells are empty.
    pub fn write_csv<W: io::Write>(&self, writer: W, key_header: &str) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = vec![key_header.to_string()];
        header.extend(self.columns.iter().cloned());
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.key.to_string()];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            );
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self, key_header: &str) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer, key_header)?;
        String::from_utf8(buffer).map_err(|e| RechargeError::validation(e.to_string()))
    }
}

impl<K> Table<K>
where
    K: TableKey + FromStr,
    K::Err: fmt::Display,
{
    /// Reads a table whose first column is the key. Empty cells are missing values.
    pub fn read_csv<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let columns: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        let mut table = Table::new(columns)?;

        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let raw_key = record.get(0).unwrap_or_default();
            let key = raw_key.trim().parse::<K>().map_err(|e| {
                RechargeError::validation(format!("row {}: invalid key '{}': {}", line + 1, raw_key, e))
            })?;
            let values = record
                .iter()
                .skip(1)
                .map(|cell| {
                    let cell = cell.trim();
                    if cell.is_empty() {
                        Ok(None)
                    } else {
                        cell.parse::<f64>().map(Some).map_err(|_| {
                            RechargeError::validation(format!(
                                "row {}: '{}' is not a number",
                                line + 1,
                                cell
                            ))
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            table.push_row(key, values)?;
        }
        Ok(table)
    }
}

/// Inner join of two tables on their key.
pub fn merge<K: TableKey>(a: &Table<K>, b: &Table<K>) -> Result<Table<K>> {
    a.merge(b)
}

/// Calendar-year aggregation over however many months each year holds.
pub fn resample_annual(table: &MonthlyTable, agg: Aggregation) -> Result<AnnualTable> {
    table.group_by(|month| month.year, agg)
}
