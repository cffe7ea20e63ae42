use super::config::Config;
use super::tokenizer::TokenRow;

/// Prefix of the positional columns following the time key
const POSITIONAL_PREFIX: &str = "col_";

/// Shape of a row on its way into a table.
///
/// Token rows come off the tokenizer with whatever length the record had (Partial). They only
/// become Rectangular through `pad`, which is the single place rows change shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Partial(Vec<String>),
    Rectangular(Vec<String>),
}

impl Row {
    pub fn len(&self) -> usize {
        self.tokens().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Partial(tokens) | Self::Rectangular(tokens) => tokens,
        }
    }

    /// Right-pad with empty tokens to exactly `width`.
    ///
    /// Total for any width; the builder always passes the widest row, so nothing is cut in practice.
    pub fn pad(self, width: usize) -> Self {
        let mut tokens = match self {
            Self::Partial(tokens) | Self::Rectangular(tokens) => tokens,
        };
        tokens.resize(width, String::new());
        Self::Rectangular(tokens)
    }

    fn into_tokens(self) -> Vec<String> {
        match self {
            Self::Partial(tokens) | Self::Rectangular(tokens) => tokens,
        }
    }
}

impl From<TokenRow> for Row {
    fn from(tokens: TokenRow) -> Self {
        Self::Partial(tokens)
    }
}

/// A rectangular table of one sensor channel. Every row is exactly as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SensorTable {
    /// A table with no columns and no rows, for channels that received nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
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

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }
}

/// TableBuilder makes a SensorTable out of a channel's token rows.
///
/// Columns are the placeholder, then the time key, then `col_0`, `col_1`, ... for whatever follows.
/// Values are kept verbatim: no reordering, deduplication or range checks.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    base_columns: Vec<String>,
}

impl TableBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            base_columns: config.base_columns(),
        }
    }

    pub fn build(&self, token_rows: Vec<TokenRow>) -> SensorTable {
        let rows: Vec<Row> = token_rows
            .into_iter()
            .filter(|tokens| !tokens.is_empty())
            .map(Row::from)
            .collect();
        if rows.is_empty() {
            return SensorTable::empty();
        }

        let max_len = rows.iter().map(Row::len).max().unwrap_or(0);
        // Rows shorter than the key prefix still get the full prefix, with empty time fields
        let width = max_len.max(self.base_columns.len());

        let mut columns = self.base_columns.clone();
        columns.extend(
            (0..width - self.base_columns.len()).map(|i| format!("{POSITIONAL_PREFIX}{i}")),
        );

        let rows = rows
            .into_iter()
            .map(|row| row.pad(width).into_tokens())
            .collect();

        SensorTable { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tokens: &[&str]) -> TokenRow {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_input_gives_empty_table() {
        let builder = TableBuilder::new(&Config::default());
        let table = builder.build(vec![]);
        assert!(table.is_empty());
        assert_eq!(table.n_columns(), 0);
        assert_eq!(table, SensorTable::empty());
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let builder = TableBuilder::new(&Config::default());
        let table = builder.build(vec![
            row(&["Mag", "1", "2", "3", "0.5"]),
            row(&["Mag", "1", "2", "4", "0.6", "0.7", "x"]),
            row(&["Mag", "1"]),
        ]);
        assert_eq!(
            table.columns(),
            &["placeholder", "day", "hour", "min", "col_0", "col_1", "col_2"]
        );
        for r in table.rows() {
            assert_eq!(r.len(), table.n_columns());
        }
        assert_eq!(table.cell(2, "hour"), Some(""));
        assert_eq!(table.cell(0, "col_1"), Some(""));
        assert_eq!(table.cell(1, "col_2"), Some("x"));
    }

    #[test]
    fn test_short_rows_keep_full_prefix() {
        let builder = TableBuilder::new(&Config::default());
        let table = builder.build(vec![row(&["Mag", "1"])]);
        assert_eq!(table.columns(), &["placeholder", "day", "hour", "min"]);
        assert_eq!(table.rows()[0], vec!["Mag", "1", "", ""]);
    }

    #[test]
    fn test_values_are_verbatim() {
        let builder = TableBuilder::new(&Config::default());
        let table = builder.build(vec![
            row(&["Mag", "1", "99", "3", "nan"]),
            row(&["Mag", "1", "99", "3", "nan"]),
        ]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.cell(0, "hour"), Some("99"));
        assert_eq!(table.cell(1, "col_0"), Some("nan"));
    }

    #[test]
    fn test_single_token_round_trip() {
        // A record with no secondary delimiter is the only non-key value of a prefix-only table
        let config = Config::default();
        let tokenizer = crate::tokenizer::RecordTokenizer::new(&config.protocol);
        let token_row = tokenizer.tokenize("Mag").unwrap();
        assert_eq!(token_row.len(), 1);
        let table = TableBuilder::new(&config).build(vec![token_row]);
        assert_eq!(table.columns(), &["placeholder", "day", "hour", "min"]);
        assert_eq!(table.rows()[0], vec!["Mag", "", "", ""]);
    }

    #[test]
    fn test_pad_is_total() {
        let partial = Row::from(row(&["a", "b"]));
        assert_eq!(partial.clone().pad(4), Row::Rectangular(row(&["a", "b", "", ""])));
        assert_eq!(partial.pad(1), Row::Rectangular(row(&["a"])));
    }
}
