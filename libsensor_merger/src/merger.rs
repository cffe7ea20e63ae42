use fxhash::FxHashMap;

use super::config::Config;
use super::table::SensorTable;

/// A cell of the unified table. None means the row had no match in the table owning the column.
pub type Cell = Option<String>;

/// The time-aligned outer join of every non-empty sensor table.
///
/// Time key columns keep their plain names; every other column is qualified by its channel
/// (`MagTest.col_0`) so that channels never collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl UnifiedTable {
    /// Lift a single sensor table, qualifying its non-key columns with the channel name
    pub fn from_sensor(channel: &str, table: SensorTable, keys: &[String]) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|c| {
                if keys.contains(c) {
                    c.clone()
                } else {
                    format!("{channel}.{c}")
                }
            })
            .collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| row.iter().cloned().map(Some).collect())
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of a cell; None when the cell is missing or the column does not exist
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?[col].as_deref()
    }

    /// Rows as written to disk: missing cells become empty strings
    pub fn records(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.as_deref().unwrap_or("")).collect())
    }

    /// First few rows in a human readable layout, for the log
    pub fn preview(&self, n_rows: usize) -> String {
        let mut text = self.columns.join(" | ");
        for record in self.records().take(n_rows) {
            text.push('\n');
            text.push_str(&record.join(" | "));
        }
        text
    }

    fn key_of<'a>(row: &'a [Cell], key_idx: &[Option<usize>]) -> Vec<Option<&'a str>> {
        key_idx
            .iter()
            .map(|idx| idx.and_then(|i| row[i].as_deref()))
            .collect()
    }
}

/// Result of a merge. Nothing to merge is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(UnifiedTable),
    NothingToMerge,
}

/// Outer join of two tables on the key columns. Keys are compared as raw strings.
///
/// Left rows come first, in order, each paired with every right row sharing its key (duplicate
/// keys give the cross product) or with missing cells when there is none. Right rows that matched
/// nothing follow, in order, with missing left cells and the key copied from the right.
/// Columns are the left's, then the right's non-key columns, so swapping the operands changes
/// the column layout and row order but not the set of rows.
pub fn outer_join(acc: UnifiedTable, next: UnifiedTable, keys: &[String]) -> UnifiedTable {
    let acc_keys: Vec<Option<usize>> = keys.iter().map(|k| acc.column_index(k)).collect();
    let next_keys: Vec<Option<usize>> = keys.iter().map(|k| next.column_index(k)).collect();
    let next_values: Vec<usize> = (0..next.n_columns())
        .filter(|i| !next_keys.contains(&Some(*i)))
        .collect();

    let mut columns = acc.columns.clone();
    columns.extend(next_values.iter().map(|&i| next.columns[i].clone()));

    let mut index: FxHashMap<Vec<Option<&str>>, Vec<usize>> = FxHashMap::default();
    for (idx, row) in next.rows.iter().enumerate() {
        index
            .entry(UnifiedTable::key_of(row, &next_keys))
            .or_default()
            .push(idx);
    }

    let mut matched = vec![false; next.n_rows()];
    let mut rows = Vec::with_capacity(acc.n_rows().max(next.n_rows()));
    for row in acc.rows.iter() {
        match index.get(&UnifiedTable::key_of(row, &acc_keys)) {
            Some(partners) => {
                for &partner in partners {
                    matched[partner] = true;
                    let mut joined = row.clone();
                    joined.extend(next_values.iter().map(|&i| next.rows[partner][i].clone()));
                    rows.push(joined);
                }
            }
            None => {
                let mut joined = row.clone();
                joined.resize(columns.len(), None);
                rows.push(joined);
            }
        }
    }

    for (idx, row) in next.rows.iter().enumerate() {
        if matched[idx] {
            continue;
        }
        let mut joined: Vec<Cell> = vec![None; acc.n_columns()];
        for (acc_key, next_key) in acc_keys.iter().zip(next_keys.iter()) {
            if let (Some(a), Some(n)) = (acc_key, next_key) {
                joined[*a] = row[*n].clone();
            }
        }
        joined.extend(next_values.iter().map(|&i| row[i].clone()));
        rows.push(joined);
    }

    UnifiedTable { columns, rows }
}

/// TimeKeyMerger folds the per-channel tables into one UnifiedTable, in channel order.
#[derive(Debug, Clone)]
pub struct TimeKeyMerger {
    keys: Vec<String>,
}

impl TimeKeyMerger {
    pub fn new(config: &Config) -> Self {
        Self {
            keys: config.time_columns.clone(),
        }
    }

    /// Merge (channel name, table) pairs. Empty tables are skipped.
    pub fn merge(&self, tables: Vec<(String, SensorTable)>) -> MergeOutcome {
        let merged = tables
            .into_iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(channel, table)| UnifiedTable::from_sensor(&channel, table, &self.keys))
            .reduce(|acc, next| outer_join(acc, next, &self.keys));

        match merged {
            Some(table) => MergeOutcome::Merged(table),
            None => MergeOutcome::NothingToMerge,
        }
    }
}
