use super::config::ProtocolConfig;

/// Literal (escaped) CR/LF the firmware sometimes prints instead of a real line break
const ESCAPED_CRLF: &str = "\\r\\n";

/// The non-empty fields of one record line, in order. Length varies from record to record.
pub type TokenRow = Vec<String>;

/// RecordTokenizer turns routed record lines into token rows.
///
/// Never fails: garbage produces a short row or no row at all.
#[derive(Debug, Clone)]
pub struct RecordTokenizer<'a> {
    protocol: &'a ProtocolConfig,
}

impl<'a> RecordTokenizer<'a> {
    pub fn new(protocol: &'a ProtocolConfig) -> Self {
        Self { protocol }
    }

    /// Tokenize a single line.
    ///
    /// Returns None if the line is empty once cleaned, is the bare terminator, or has no
    /// non-empty field.
    pub fn tokenize(&self, line: &str) -> Option<TokenRow> {
        let cleaned = line.replace(ESCAPED_CRLF, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() || cleaned == self.protocol.terminator {
            return None;
        }

        // Empty pieces go, including the one left behind by the trailing terminator
        let tokens: TokenRow = cleaned
            .split(self.protocol.secondary_delimiter.as_str())
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(String::from)
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(tokens)
        }
    }

    /// Tokenize a routed record. A record carrying real line breaks yields one row per line.
    pub fn tokenize_record(&self, record: &str) -> Vec<TokenRow> {
        record
            .split(['\r', '\n'])
            .filter_map(|line| self.tokenize(line))
            .collect()
    }

    /// Tokenize every record of a channel, in order
    pub fn tokenize_all<'r>(&self, records: impl IntoIterator<Item = &'r String>) -> Vec<TokenRow> {
        records
            .into_iter()
            .flat_map(|record| self.tokenize_record(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_record() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        assert_eq!(
            tokenizer.tokenize("Mag:12| 1 |2|3| -0.51 ||"),
            Some(vec![
                String::from("Mag:12"),
                String::from("1"),
                String::from("2"),
                String::from("3"),
                String::from("-0.51"),
            ])
        );
    }

    #[test]
    fn test_skips_empty_and_terminator() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        assert_eq!(tokenizer.tokenize(""), None);
        assert_eq!(tokenizer.tokenize("   "), None);
        assert_eq!(tokenizer.tokenize("||"), None);
        assert_eq!(tokenizer.tokenize(" \\r\\n|| "), None);
        assert_eq!(tokenizer.tokenize("| | |"), None);
    }

    #[test]
    fn test_strips_escaped_crlf() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        assert_eq!(
            tokenizer.tokenize("\\r\\nAtm_tem_h|1|2|3|20.1\\r\\n||"),
            Some(vec![
                String::from("Atm_tem_h"),
                String::from("1"),
                String::from("2"),
                String::from("3"),
                String::from("20.1"),
            ])
        );
    }

    #[test]
    fn test_no_secondary_delimiter_is_single_token() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        assert_eq!(tokenizer.tokenize("Mag"), Some(vec![String::from("Mag")]));
    }

    #[test]
    fn test_multiline_record() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        let rows = tokenizer.tokenize_record("Mag|1|2\r\n3|4||");
        assert_eq!(
            rows,
            vec![
                vec![String::from("Mag"), String::from("1"), String::from("2")],
                vec![String::from("3"), String::from("4")],
            ]
        );
    }

    #[test]
    fn test_garbage_never_panics() {
        let protocol = ProtocolConfig::default();
        let tokenizer = RecordTokenizer::new(&protocol);
        for line in ["\u{fffd}\u{fffd}||", "|||||||", "\\r\\n\\r\\n", "a|\u{0}|b||"] {
            let _ = tokenizer.tokenize(line);
        }
        assert_eq!(
            tokenizer.tokenize("a|\u{0}|b||").map(|r| r.len()),
            Some(3)
        );
    }
}
