//! The authoritative zone store: an immutable, in-memory view of a
//! single zone loaded from a master file at startup.

use std::collections::HashMap;
use std::fmt;

use dns_types::protocol::types::{DomainName, RecordType, ResourceRecord};
use dns_types::zones;

/// Error loading or validating a zone file.
#[derive(Debug)]
pub enum ZoneError {
    Parse(zones::Error),
    NoSoa,
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ZoneError::Parse(err) => write!(f, "failed to parse zone file: {err}"),
            ZoneError::NoSoa => write!(f, "zone file contains no SOA record"),
        }
    }
}

impl std::error::Error for ZoneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZoneError::Parse(err) => Some(err),
            ZoneError::NoSoa => None,
        }
    }
}

impl From<zones::Error> for ZoneError {
    fn from(err: zones::Error) -> Self {
        ZoneError::Parse(err)
    }
}

/// An authoritative zone: the apex, every RR grouped by owner name,
/// and the apex's own NS records (kept separately since they're
/// consulted on almost every lookup.
#[derive(Debug, Clone)]
pub struct Zone {
    apex: DomainName,
    records: HashMap<DomainName, Vec<ResourceRecord>>,
    apex_ns: Vec<ResourceRecord>,
}

impl Zone {
    /// # Errors
    ///
    /// If the zone file cannot be parsed, or contains no SOA record.
    pub fn from_str(data: &str) -> Result<Self, ZoneError> {
        let parsed = zones::parse(data)?;

        let apex = parsed
            .records
            .iter()
            .find(|rr| rr.rtype() == RecordType::SOA)
            .map(|rr| rr.name.clone())
            .ok_or(ZoneError::NoSoa)?;

        let mut records: HashMap<DomainName, Vec<ResourceRecord>> = HashMap::new();
        for owned in parsed.records {
            let rr = ResourceRecord {
                name: owned.name,
                rdata: owned.rdata,
                rclass: owned.rclass,
                ttl: owned.ttl,
            };
            records.entry(rr.name.clone()).or_default().push(rr);
        }

        let apex_ns = records
            .get(&apex)
            .map(|rrs| {
                rrs.iter()
                    .filter(|rr| rr.rtype() == RecordType::NS)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            apex,
            records,
            apex_ns,
        })
    }

    pub fn apex(&self) -> &DomainName {
        &self.apex
    }

    pub fn apex_ns(&self) -> &[ResourceRecord] {
        &self.apex_ns
    }

    /// `true` iff `qname` is the apex or a subdomain of it.
    pub fn is_authoritative(&self, qname: &DomainName) -> bool {
        qname.is_subdomain_of(&self.apex)
    }

    /// All RRs stored under this exact owner name, in file order.
    pub fn lookup(&self, name: &DomainName) -> &[ResourceRecord] {
        self.records.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn lookup_type(&self, name: &DomainName, rtype: RecordType) -> Vec<ResourceRecord> {
        self.lookup(name)
            .iter()
            .filter(|rr| rr.rtype() == rtype)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::domain;

    const ZONE: &str = "
example.com. 3600 IN SOA ns1.example.com. admin.example.com. 1 7200 3600 1209600 3600
example.com. 3600 IN NS ns1.example.com.
ns1.example.com. 3600 IN A 192.0.2.1
www.example.com. 300 IN A 192.0.2.2
mail.example.com. 300 IN CNAME www.example.com.
";

    #[test]
    fn apex_is_the_soa_owner() {
        let zone = Zone::from_str(ZONE).unwrap();
        assert_eq!(zone.apex(), &domain("example.com"));
    }

    #[test]
    fn is_authoritative_respects_label_boundaries() {
        let zone = Zone::from_str(ZONE).unwrap();
        assert!(zone.is_authoritative(&domain("www.example.com")));
        assert!(zone.is_authoritative(&domain("example.com")));
        assert!(!zone.is_authoritative(&domain("ooexample.com")));
        assert!(!zone.is_authoritative(&domain("com")));
    }

    #[test]
    fn lookup_type_filters_by_rtype() {
        let zone = Zone::from_str(ZONE).unwrap();
        let a_records = zone.lookup_type(&domain("www.example.com"), RecordType::A);
        assert_eq!(a_records.len(), 1);
        let ns_records = zone.lookup_type(&domain("www.example.com"), RecordType::NS);
        assert!(ns_records.is_empty());
    }

    #[test]
    fn apex_ns_is_populated() {
        let zone = Zone::from_str(ZONE).unwrap();
        assert_eq!(zone.apex_ns().len(), 1);
    }

    #[test]
    fn missing_soa_is_an_error() {
        let zone = "example.com. 3600 IN A 192.0.2.1\n";
        assert!(matches!(Zone::from_str(zone), Err(ZoneError::NoSoa)));
    }
}
