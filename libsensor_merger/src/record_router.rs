use super::config::ChannelConfig;
use super::frame_splitter::CandidateRecord;

/// The records that ended up on one sensor channel, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecords {
    pub channel: ChannelConfig,
    pub records: Vec<String>,
}

impl ChannelRecords {
    /// Body of the channel text file: one record per line, each newline terminated
    pub fn render(&self) -> String {
        let mut body = String::new();
        for record in self.records.iter() {
            body.push_str(record);
            body.push('\n');
        }
        body
    }
}

/// Output of the router. Channels are kept in configured order, including the ones that got nothing.
#[derive(Debug, Clone, Default)]
pub struct RoutedRecords {
    pub channels: Vec<ChannelRecords>,
    pub unrouted: usize,
}

impl RoutedRecords {
    pub fn get(&self, name: &str) -> Option<&ChannelRecords> {
        self.channels.iter().find(|c| c.channel.name == name)
    }

    pub fn total_routed(&self) -> usize {
        self.channels.iter().map(|c| c.records.len()).sum()
    }
}

/// RecordRouter hands every candidate record to exactly one sensor channel.
///
/// Keywords are tested in configured order and the first channel whose keyword is contained in
/// the record wins. If one keyword is a substring of another, the channel configured first
/// takes every record containing it. Records matching no keyword are dropped.
#[derive(Debug, Clone)]
pub struct RecordRouter<'a> {
    channels: &'a [ChannelConfig],
}

impl<'a> RecordRouter<'a> {
    pub fn new(channels: &'a [ChannelConfig]) -> Self {
        Self { channels }
    }

    /// Index of the channel owning this record, if any
    pub fn channel_for(&self, record: &str) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| record.contains(channel.keyword.as_str()))
    }

    pub fn route(&self, candidates: Vec<CandidateRecord>) -> RoutedRecords {
        let mut routed = RoutedRecords {
            channels: self
                .channels
                .iter()
                .map(|channel| ChannelRecords {
                    channel: channel.clone(),
                    records: Vec::new(),
                })
                .collect(),
            unrouted: 0,
        };
        for candidate in candidates {
            match self.channel_for(candidate.as_str()) {
                Some(idx) => routed.channels[idx].records.push(candidate.into_inner()),
                None => routed.unrouted += 1,
            }
        }
        routed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProtocolConfig};
    use crate::frame_splitter::FrameSplitter;

    fn candidates(text: &str) -> Vec<CandidateRecord> {
        let protocol = ProtocolConfig::default();
        FrameSplitter::new(&protocol).split(text)
    }

    #[test]
    fn test_routes_by_keyword() {
        let config = Config::default();
        let router = RecordRouter::new(&config.channels);
        let routed = router.route(candidates(
            "!!Mag|1|2|3|0.1||!!Atm_tem_h|1|2|3|21.0|40||!!SGP30_aht20|1|2|3|400||!!Unknown|1|2|3||",
        ));
        assert_eq!(routed.get("MagTest").unwrap().records, vec!["Mag|1|2|3|0.1||"]);
        assert_eq!(
            routed.get("txt_Atm_tem_h").unwrap().records,
            vec!["Atm_tem_h|1|2|3|21.0|40||"]
        );
        assert_eq!(
            routed.get("SGP30_aht20").unwrap().records,
            vec!["SGP30_aht20|1|2|3|400||"]
        );
        assert_eq!(routed.unrouted, 1);
        assert_eq!(routed.total_routed(), 3);
    }

    #[test]
    fn test_first_configured_match_wins() {
        let channels = vec![
            ChannelConfig::new("first", "Mag"),
            ChannelConfig::new("second", "Magnet"),
        ];
        let router = RecordRouter::new(&channels);
        let routed = router.route(candidates("!!Magnet|1|2|3||!!Mag|4|5|6||"));
        assert_eq!(routed.channels[0].records.len(), 2);
        assert!(routed.channels[1].records.is_empty());
    }

    #[test]
    fn test_never_double_routed() {
        let config = Config::default();
        let router = RecordRouter::new(&config.channels);
        // Contains both the Mag and Atm_tem_h keywords
        let input = candidates("!!Atm_tem_h Mag|1|2|3||!!Mag Atm_tem_h|1|2|3||");
        let n_input = input.len();
        let routed = router.route(input);
        assert_eq!(routed.total_routed() + routed.unrouted, n_input);
        assert_eq!(routed.get("MagTest").unwrap().records.len(), 2);
    }

    #[test]
    fn test_render_is_newline_terminated() {
        let config = Config::default();
        let router = RecordRouter::new(&config.channels);
        let routed = router.route(candidates("!!Mag|1|2|3||!!Mag|1|2|4||"));
        assert_eq!(
            routed.get("MagTest").unwrap().render(),
            "Mag|1|2|3||\nMag|1|2|4||\n"
        );
        assert_eq!(routed.get("SGP30_aht20").unwrap().render(), "");
    }
}
