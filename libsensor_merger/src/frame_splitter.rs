use super::config::ProtocolConfig;

/// Decode a raw capture into text. Invalid UTF-8 is replaced, never fatal.
pub fn decode_capture(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// A delimiter-bounded, trimmed piece of the capture which passed the shape checks.
///
/// The terminator is kept; it is stripped later by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord(String);

impl CandidateRecord {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Counts of what happened to every segment of a capture. Only used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub segments: usize,
    pub accepted: usize,
    pub unterminated: usize,
    pub oversized: usize,
}

/// FrameSplitter cuts a capture on the primary delimiter and keeps the segments that look like records.
///
/// A segment is accepted iff, after trimming, it ends with the terminator and is at most
/// `max_record_len` characters long. Everything else is noise from the serial line and is dropped.
#[derive(Debug, Clone)]
pub struct FrameSplitter<'a> {
    protocol: &'a ProtocolConfig,
}

impl<'a> FrameSplitter<'a> {
    pub fn new(protocol: &'a ProtocolConfig) -> Self {
        Self { protocol }
    }

    /// Split the capture text into candidate records, preserving stream order
    pub fn split(&self, text: &str) -> Vec<CandidateRecord> {
        self.split_with_stats(text).0
    }

    /// Same as split, but also reports how many segments were dropped and why
    pub fn split_with_stats(&self, text: &str) -> (Vec<CandidateRecord>, SplitStats) {
        let mut stats = SplitStats::default();
        let mut candidates = Vec::new();
        for segment in text.split(self.protocol.primary_delimiter.as_str()) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            stats.segments += 1;
            if !segment.ends_with(self.protocol.terminator.as_str()) {
                stats.unterminated += 1;
                continue;
            }
            // Length counts characters, not bytes
            if segment.chars().count() > self.protocol.max_record_len {
                stats.oversized += 1;
                continue;
            }
            stats.accepted += 1;
            candidates.push(CandidateRecord(segment.to_string()));
        }
        (candidates, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_oversized_dropped() {
        let protocol = ProtocolConfig::default();
        let splitter = FrameSplitter::new(&protocol);
        let junk = "junk".repeat(18);
        let text = format!("!!Mag:12|1|2|3||!!{junk}||");
        let (candidates, stats) = splitter.split_with_stats(&text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].as_str(), "Mag:12|1|2|3||");
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.accepted, 1);
    }

    #[test]
    fn test_every_candidate_is_well_formed() {
        let protocol = ProtocolConfig::default();
        let splitter = FrameSplitter::new(&protocol);
        let text = "garbage!!Atm_tem_h|1|2|3|22.5||\r\n!!Mag|1|2|3|0.5|!!  Mag|1|2|3||  !!||!!!!\u{fffd}\u{fffd}||";
        let candidates = splitter.split(text);
        assert!(!candidates.is_empty());
        for candidate in candidates.iter() {
            assert!(candidate.as_str().ends_with("||"));
            assert!(candidate.as_str().chars().count() <= 70);
        }
        assert_eq!(candidates[1].as_str(), "Mag|1|2|3||");
    }

    #[test]
    fn test_length_boundary() {
        let protocol = ProtocolConfig::default();
        let splitter = FrameSplitter::new(&protocol);
        let exact = format!("{}||", "a".repeat(68));
        let over = format!("{}||", "a".repeat(69));
        let text = format!("!!{exact}!!{over}");
        let candidates = splitter.split(&text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].as_str(), exact);
    }

    #[test]
    fn test_empty_capture() {
        let protocol = ProtocolConfig::default();
        let splitter = FrameSplitter::new(&protocol);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("!!!!!!   !!").is_empty());
    }

    #[test]
    fn test_split_is_idempotent() {
        let protocol = ProtocolConfig::default();
        let splitter = FrameSplitter::new(&protocol);
        let text = "!!Mag|1|2|3||!!SGP30_aht20|1|2|3|400|0||!!broken|1";
        assert_eq!(splitter.split(text), splitter.split(text));
    }

    #[test]
    fn test_lossy_decode() {
        let raw = b"!!Mag|1|\xff\xfe2|3||";
        let text = decode_capture(raw);
        assert!(text.contains('\u{fffd}'));
        assert!(text.starts_with("!!Mag|1|"));
    }
}
