//! Decoded header and footer records, and the session they describe.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::registry::{field, SchemaVersion};

/// Values carried by the first line of a log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderInfo {
    pub enable_time: DateTime<Utc>,
    pub siftr_version: String,
    pub sysname: String,
    pub sysver: String,
    pub ipmode: String,
}

/// Footer counters in log order, keyed by their schema field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FooterCounters(Vec<(&'static str, u64)>);

impl FooterCounters {
    pub fn push(&mut self, name: &'static str, value: u64) {
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, u64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Values carried by the last line of a log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FooterInfo {
    pub disable_time: DateTime<Utc>,
    pub counters: FooterCounters,
    /// Serialized flow registry; absent for schemas without one.
    pub flow_list: Option<String>,
}

/// Session metadata assembled from the header and footer of one log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSession {
    pub enable_time: DateTime<Utc>,
    pub disable_time: DateTime<Utc>,
    pub siftr_version: String,
    pub sysname: String,
    pub sysver: String,
    pub ipmode: String,
    pub schema: SchemaVersion,
    pub counters: FooterCounters,
}

impl LogSession {
    pub fn new(header: HeaderInfo, footer: &FooterInfo, schema: SchemaVersion) -> Self {
        Self {
            enable_time: header.enable_time,
            disable_time: footer.disable_time,
            siftr_version: header.siftr_version,
            sysname: header.sysname,
            sysver: header.sysver,
            ipmode: header.ipmode,
            schema,
            counters: footer.counters.clone(),
        }
    }

    /// Time between enabling and disabling the logger.
    pub fn duration(&self) -> Duration {
        self.disable_time - self.enable_time
    }

    pub fn global_flow_count(&self) -> Option<u64> {
        self.counters.get(field::GLOBAL_FLOW_CNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64, usecs: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, usecs * 1_000).unwrap()
    }

    #[test]
    fn duration_borrows_across_the_second_boundary() {
        let header = HeaderInfo {
            enable_time: at(100, 900_000),
            siftr_version: "2.0".into(),
            sysname: "FreeBSD".into(),
            sysver: "1500000".into(),
            ipmode: "4".into(),
        };
        let mut counters = FooterCounters::default();
        counters.push(field::GLOBAL_FLOW_CNT, 3);
        let footer = FooterInfo {
            disable_time: at(102, 100_000),
            counters,
            flow_list: None,
        };
        let session = LogSession::new(header, &footer, SchemaVersion::Siftr2);
        assert_eq!(session.duration().num_microseconds(), Some(1_200_000));
        assert_eq!(session.global_flow_count(), Some(3));
    }
}
