//! Flow registry construction and lookup.
//!
//! Two build modes:
//! - footer mode, from the `flow_list` value of a siftr 2.x footer;
//! - inferred mode, from the flow ids seen in body records, for logs whose
//!   footer carries no flow list.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use log::{debug, error, warn};

use super::types::{FlowAttributes, FlowDescriptor};
use crate::decoding::BodyRecord;
use crate::error_handling::types::{ParseError, RegistryError};
use crate::schema::registry::{FLOW_ENTRY_DELIMITER, FLOW_FIELD_DELIMITER};

const FLOW_LIST_FIELDS: usize = 10;

/// Flows of one log, in footer order (or first-sighting order when inferred).
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
    flows: Vec<FlowDescriptor>,
    index: HashMap<u32, usize>,
    inferred: bool,
}

fn flow_field<T: FromStr>(name: &'static str, value: &str) -> Result<T, ParseError> {
    value.trim().parse::<T>().map_err(|_| ParseError::InvalidValue {
        field: name,
        value: value.trim().to_string(),
        line: None,
    })
}

fn parse_flow_entry(entry: &str) -> Result<FlowDescriptor, ParseError> {
    let fields: Vec<&str> = entry.split(FLOW_FIELD_DELIMITER).collect();
    if fields.len() != FLOW_LIST_FIELDS {
        error!(
            "flow list entry has {} fields, expected {}",
            fields.len(),
            FLOW_LIST_FIELDS
        );
        return Err(ParseError::FieldCountMismatch {
            expected: FLOW_LIST_FIELDS,
            actual: fields.len(),
            line: None,
        });
    }

    let laddr: IpAddr = flow_field("laddr", fields[1])?;
    let lport: u16 = flow_field("lport", fields[2])?;
    let faddr: IpAddr = flow_field("faddr", fields[3])?;
    let fport: u16 = flow_field("fport", fields[4])?;
    let is_sack: u8 = flow_field("is_sack", fields[6])?;

    let attributes = FlowAttributes {
        local: SocketAddr::new(laddr, lport),
        foreign: SocketAddr::new(faddr, fport),
        mss: flow_field("mss", fields[5])?,
        sack_capable: is_sack != 0,
        snd_scale: flow_field("snd_scale", fields[7])?,
        rcv_scale: flow_field("rcv_scale", fields[8])?,
    };
    Ok(FlowDescriptor::new(
        flow_field("flowid", fields[0])?,
        Some(attributes),
        flow_field("record_cnt", fields[9])?,
    ))
}

impl FlowRegistry {
    /// Builds the registry from a footer flow list.
    ///
    /// Fails with [`ParseError::FlowListCountMismatch`] when the number of
    /// parsed entries differs from `declared`, and with
    /// [`ParseError::DuplicateFlowId`] when an id is listed twice.
    pub fn from_flow_list(flow_list: &str, declared: u32) -> Result<Self, ParseError> {
        let mut registry = FlowRegistry::default();
        for entry in flow_list
            .split(FLOW_ENTRY_DELIMITER)
            .filter(|e| !e.trim().is_empty())
        {
            let flow = parse_flow_entry(entry)?;
            debug!("registered flow {}", flow);
            registry.insert(flow)?;
        }

        if registry.len() != declared as usize {
            error!(
                "footer declares {} flows but flow list holds {}",
                declared,
                registry.len()
            );
            return Err(ParseError::FlowListCountMismatch {
                declared,
                parsed: registry.len(),
            });
        }
        Ok(registry)
    }

    /// Builds the registry from body records.
    pub fn infer<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BodyRecord>,
    {
        let mut registry = FlowRegistry::empty_inferred();
        for record in records {
            registry.record_sighting(record.flow_id);
        }
        registry
    }

    /// An inferred-mode registry to be fed with [`record_sighting`](Self::record_sighting).
    pub fn empty_inferred() -> Self {
        Self {
            inferred: true,
            ..Self::default()
        }
    }

    /// Counts one body record for `flow_id`, creating a partial descriptor
    /// on first sighting.
    pub fn record_sighting(&mut self, flow_id: u32) {
        if !self.inferred {
            warn!("ignoring sighting of flow {} on a footer-built registry", flow_id);
            return;
        }
        match self.index.get(&flow_id) {
            Some(&i) => self.flows[i].record_count += 1,
            None => {
                debug!("inferred new flow {}", flow_id);
                self.index.insert(flow_id, self.flows.len());
                self.flows.push(FlowDescriptor::new(flow_id, None, 1));
            }
        }
    }

    fn insert(&mut self, flow: FlowDescriptor) -> Result<(), ParseError> {
        if self.index.contains_key(&flow.flow_id) {
            error!("flow id {} listed more than once", flow.flow_id);
            return Err(ParseError::DuplicateFlowId(flow.flow_id));
        }
        self.index.insert(flow.flow_id, self.flows.len());
        self.flows.push(flow);
        Ok(())
    }

    pub fn lookup(&self, flow_id: u32) -> Result<&FlowDescriptor, RegistryError> {
        self.index
            .get(&flow_id)
            .map(|&i| &self.flows[i])
            .ok_or(RegistryError::FlowNotFound(flow_id))
    }

    pub fn lookup_mut(&mut self, flow_id: u32) -> Result<&mut FlowDescriptor, RegistryError> {
        match self.index.get(&flow_id) {
            Some(&i) => Ok(&mut self.flows[i]),
            None => Err(RegistryError::FlowNotFound(flow_id)),
        }
    }

    /// Zeroes every per-pass direction counter.
    pub fn reset_counters(&mut self) {
        for flow in &mut self.flows {
            flow.dir_in = 0;
            flow.dir_out = 0;
        }
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowDescriptor> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::Direction;

    const FLOW_LIST: &str = "7,10.0.0.1,5001,10.0.0.2,40000,1448,1,6,7,5;9,fe80::1,5002,fe80::2,40001,1220,0,0,0,0;";

    #[test]
    fn footer_mode_parses_every_entry() {
        let registry = FlowRegistry::from_flow_list(FLOW_LIST, 2).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_inferred());

        let flow = registry.lookup(7).unwrap();
        let attrs = flow.attributes.as_ref().unwrap();
        assert_eq!(attrs.local, "10.0.0.1:5001".parse::<SocketAddr>().unwrap());
        assert_eq!(attrs.foreign, "10.0.0.2:40000".parse::<SocketAddr>().unwrap());
        assert_eq!(attrs.mss, 1448);
        assert!(attrs.sack_capable);
        assert_eq!((attrs.snd_scale, attrs.rcv_scale), (6, 7));
        assert_eq!(flow.record_count, 5);
        assert_eq!((flow.dir_in, flow.dir_out), (0, 0));

        let v6 = registry.lookup(9).unwrap();
        assert_eq!(v6.endpoints(), "[fe80::1]:5002<->[fe80::2]:40001");
        assert!(!v6.attributes.as_ref().unwrap().sack_capable);

        let ids: Vec<u32> = registry.iter().map(|f| f.flow_id).collect();
        assert_eq!(ids, vec![7, 9]);
    }

    #[test]
    fn declared_count_must_match() {
        assert!(matches!(
            FlowRegistry::from_flow_list(FLOW_LIST, 3),
            Err(ParseError::FlowListCountMismatch {
                declared: 3,
                parsed: 2
            })
        ));
        assert!(FlowRegistry::from_flow_list("", 0).unwrap().is_empty());
    }

    #[test]
    fn repeated_flow_id_is_rejected() {
        let list = "7,10.0.0.1,1,10.0.0.2,2,1448,1,6,6,1;7,10.0.0.1,3,10.0.0.2,4,1448,1,6,6,1";
        assert!(matches!(
            FlowRegistry::from_flow_list(list, 2),
            Err(ParseError::DuplicateFlowId(7))
        ));
    }

    #[test]
    fn malformed_entry_is_reported() {
        assert!(matches!(
            FlowRegistry::from_flow_list("7,10.0.0.1,5001", 1),
            Err(ParseError::FieldCountMismatch {
                expected: 10,
                actual: 3,
                ..
            })
        ));
        assert!(matches!(
            FlowRegistry::from_flow_list("7,not-an-ip,1,10.0.0.2,2,1448,1,6,6,1", 1),
            Err(ParseError::InvalidValue { field: "laddr", .. })
        ));
    }

    #[test]
    fn inferred_mode_counts_sightings_in_order() {
        let mut registry = FlowRegistry::empty_inferred();
        for id in [4, 2, 4, 4, 2, 8] {
            registry.record_sighting(id);
        }
        let seen: Vec<(u32, u64)> = registry.iter().map(|f| (f.flow_id, f.record_count)).collect();
        assert_eq!(seen, vec![(4, 3), (2, 2), (8, 1)]);
        assert!(registry.lookup(4).unwrap().attributes.is_none());
        assert!(registry.lookup(4).unwrap().mss().is_none());
    }

    #[test]
    fn infer_builds_from_decoded_records() {
        use crate::decoding::field_decoder::tests::body_line;
        use crate::decoding::FieldDecoder;
        use crate::schema::SchemaVersion;

        let decoder = FieldDecoder::new(SchemaVersion::Siftr1).unwrap();
        let records: Vec<BodyRecord> = [3u32, 3, 5]
            .iter()
            .map(|&id| {
                let line = body_line(SchemaVersion::Siftr1, "o", "1.0", id, 10, 0, (0, 0, 0));
                decoder.decode(&line).unwrap()
            })
            .collect();
        let registry = FlowRegistry::infer(&records);
        assert!(registry.is_inferred());
        assert_eq!(registry.lookup(3).unwrap().record_count, 2);
        assert_eq!(registry.lookup(5).unwrap().record_count, 1);
        assert_eq!(registry.lookup(5).unwrap().to_string(), "id:         5 (inferred) cnt:1");
    }

    #[test]
    fn lookup_of_unknown_flow_is_not_found() {
        let registry = FlowRegistry::from_flow_list(FLOW_LIST, 2).unwrap();
        assert!(matches!(registry.lookup(1234), Err(RegistryError::FlowNotFound(1234))));
    }

    #[test]
    fn counters_reset_between_passes() {
        let mut registry = FlowRegistry::from_flow_list(FLOW_LIST, 2).unwrap();
        {
            let flow = registry.lookup_mut(7).unwrap();
            flow.count_direction(Direction::In);
            flow.count_direction(Direction::Out);
            flow.count_direction(Direction::Out);
        }
        assert_eq!(registry.lookup(7).unwrap().dir_out, 2);
        registry.reset_counters();
        let flow = registry.lookup(7).unwrap();
        assert_eq!((flow.dir_in, flow.dir_out), (0, 0));
        assert_eq!(flow.record_count, 5);
    }

    #[test]
    fn display_matches_flow_list_report() {
        let registry = FlowRegistry::from_flow_list(FLOW_LIST, 2).unwrap();
        assert_eq!(
            registry.lookup(7).unwrap().to_string(),
            "id:         7 (10.0.0.1:5001<->10.0.0.2:40000) mss:1448 SACK:1 snd/rcv_scal:6/7 cnt:5"
        );
    }
}
