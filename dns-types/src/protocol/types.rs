use std::fmt;
use std::net::Ipv4Addr;

/// A domain name, normalized to lowercase with no trailing dot.
///
/// Normalization happens once, at construction, so that every map key and
/// every comparison elsewhere in the crate can just compare the inner
/// string. See the DESIGN NOTE on case/trailing-dot normalization.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct DomainName(String);

impl DomainName {
    /// The DNS root, `.`.
    pub fn root() -> Self {
        DomainName(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a `DomainName` from user/zone-file/wire text, stripping a
    /// trailing dot and lowercasing.
    pub fn new(s: &str) -> Self {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        DomainName(trimmed.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` iff `self` is `other`, or a subdomain of it, matching on
    /// label boundaries (so `ooexample.com` is not a subdomain of
    /// `example.com`).
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0 || self.0.ends_with(&format!(".{}", other.0))
    }

    /// The labels of this name, outermost first (`www.example.com` ->
    /// `["com", "example", "www"]`), matching the wire order used for
    /// suffix comparisons.
    pub fn labels(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            let mut labels: Vec<&str> = self.0.split('.').collect();
            labels.reverse();
            labels
        }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}.", self.0)
        }
    }
}

/// The type of a resource record, or of a question.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    /// Any other wire value: the server has no opinion on these and will
    /// never have a zone-file or cache entry of this type.
    Other(u16),
}

impl RecordType {
    pub fn to_wire(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::Other(n) => n,
        }
    }

    pub fn from_wire(n: u16) -> Self {
        match n {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            other => RecordType::Other(other),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::Other(n) => write!(f, "TYPE{n}"),
        }
    }
}

impl std::str::FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "CNAME" => Ok(RecordType::CNAME),
            "SOA" => Ok(RecordType::SOA),
            _ => Err(()),
        }
    }
}

/// The class of a resource record, or of a question. Only `IN` is
/// meaningfully supported; this type exists so wire messages carrying
/// other classes round-trip without panicking.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum RecordClass {
    IN,
    Other(u16),
}

impl RecordClass {
    pub fn to_wire(self) -> u16 {
        match self {
            RecordClass::IN => 1,
            RecordClass::Other(n) => n,
        }
    }

    pub fn from_wire(n: u16) -> Self {
        match n {
            1 => RecordClass::IN,
            other => RecordClass::Other(other),
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Other(n) => write!(f, "CLASS{n}"),
        }
    }
}

/// Type-specific record data. Keeping this as a single enum (rather than
/// a type tag plus an opaque rdata blob) means a `ResourceRecord` is
/// always well-formed: there is no way to have an `A` record whose rdata
/// isn't an IPv4 address.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum RecordData {
    A { address: Ipv4Addr },
    NS { nsdname: DomainName },
    CNAME { cname: DomainName },
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    /// Unrecognised type: carries the raw rdata octets through
    /// unmodified so unrelated record types don't get dropped on a
    /// parse/re-serialise round trip.
    Other { rtype: u16, octets: Vec<u8> },
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::NS { .. } => RecordType::NS,
            RecordData::CNAME { .. } => RecordType::CNAME,
            RecordData::SOA { .. } => RecordType::SOA,
            RecordData::Other { rtype, .. } => RecordType::Other(*rtype),
        }
    }
}

/// A single resource record: owner, type-and-data, class, and TTL.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rdata: RecordData,
    pub rclass: RecordClass,
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RecordType {
        self.rdata.rtype()
    }
}

/// The question section of a `Message`. Exactly one of these is
/// permitted per message in this server.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Question {
    pub name: DomainName,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

/// A four bit field specifying the kind of query. Only `Standard` is
/// used by this server; others round-trip on the wire but are refused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum Opcode {
    Standard,
    Other(u8),
}

impl Opcode {
    pub fn to_wire(self) -> u8 {
        match self {
            Opcode::Standard => 0,
            Opcode::Other(n) => n,
        }
    }

    pub fn from_wire(n: u8) -> Self {
        match n {
            0 => Opcode::Standard,
            other => Opcode::Other(other),
        }
    }
}

/// Response code, see section 4.1.1 of RFC 1035.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Other(u8),
}

impl Rcode {
    pub fn to_wire(self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Other(n) => n,
        }
    }

    pub fn from_wire(n: u8) -> Self {
        match n {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Other(other),
        }
    }
}

/// Common header type for all messages.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: Opcode,
    pub is_authoritative: bool,
    pub is_truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: Rcode,
}

/// A full DNS message: header, question section (at most one question
/// is produced by this crate's parser — see `Error::MultipleQuestions`),
/// and the three record sections.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Message {
    pub header: Header,
    pub question: Option<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// Build the skeleton of a response to this message: same id and
    /// question, `QR` set, `RA` set, everything else cleared. Callers
    /// fill in `AA`/`RCODE`/the record sections.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                rcode: Rcode::NoError,
            },
            question: self.question.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A response carrying only an id and an rcode — used when the
    /// request couldn't be parsed well enough to recover a question.
    pub fn make_bare_response(id: u16, rcode: Rcode) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: true,
                rcode,
            },
            question: None,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            question: Some(question),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;
    use std::net::Ipv4Addr;

    pub fn domain(s: &str) -> DomainName {
        DomainName::new(s)
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::A { address },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn ns_record(name: &str, nsdname: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::NS {
                nsdname: domain(nsdname),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn cname_record(name: &str, cname: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::CNAME {
                cname: domain(cname),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn domain_normalizes_case_and_trailing_dot() {
        assert_eq!(domain("Example.COM."), domain("example.com"));
    }

    #[test]
    fn domain_is_subdomain_of_is_label_bounded() {
        assert!(domain("www.example.com").is_subdomain_of(&domain("example.com")));
        assert!(domain("example.com").is_subdomain_of(&domain("example.com")));
        assert!(!domain("ooexample.com").is_subdomain_of(&domain("example.com")));
        assert!(!domain("example.com").is_subdomain_of(&domain("www.example.com")));
    }

    #[test]
    fn root_contains_everything() {
        assert!(domain("example.com").is_subdomain_of(&DomainName::root()));
        assert!(DomainName::root().is_subdomain_of(&DomainName::root()));
    }

    #[test]
    fn display_round_trips_through_dotted_form() {
        assert_eq!("example.com.", domain("example.com").to_string());
        assert_eq!(".", DomainName::root().to_string());
    }

    #[test]
    fn a_record_rtype_matches_data() {
        assert_eq!(RecordType::A, a_record("x.com", Ipv4Addr::LOCALHOST).rtype());
        assert_eq!(RecordType::NS, ns_record("x.com", "ns.x.com").rtype());
        assert_eq!(RecordType::CNAME, cname_record("x.com", "y.com").rtype());
    }
}
