//! Deserialisation of DNS messages from the network. See the `types`
//! module for details of the format.

use std::net::Ipv4Addr;

use crate::protocol::types::*;

const HEADER_MASK_QR: u8 = 0b1000_0000;
const HEADER_MASK_OPCODE: u8 = 0b0111_1000;
const HEADER_OFFSET_OPCODE: u8 = 3;
const HEADER_MASK_AA: u8 = 0b0000_0100;
const HEADER_MASK_TC: u8 = 0b0000_0010;
const HEADER_MASK_RD: u8 = 0b0000_0001;
const HEADER_MASK_RA: u8 = 0b1000_0000;
const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// Errors encountered when parsing a datagram. In all the variants which
/// carry a `u16`, that is the transaction id recovered from the header —
/// so that a well-formed error response can still be sent back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The datagram is not even 2 octets long, so it doesn't even
    /// contain a valid ID. No reply can be linked to this request.
    CompletelyBusted,
    HeaderTooShort(u16),
    QuestionTooShort(u16),
    ResourceRecordTooShort(u16),
    ResourceRecordInvalid(u16),
    DomainTooShort(u16),
    DomainTooLong(u16),
    DomainPointerInvalid(u16),
    DomainLabelInvalid(u16),
    /// More than one question was present. The core refuses these with
    /// SERVFAIL rather than guessing which question to answer.
    MultipleQuestions(u16),
}

impl Error {
    pub fn id(self) -> Option<u16> {
        match self {
            Error::CompletelyBusted => None,
            Error::HeaderTooShort(id)
            | Error::QuestionTooShort(id)
            | Error::ResourceRecordTooShort(id)
            | Error::ResourceRecordInvalid(id)
            | Error::DomainTooShort(id)
            | Error::DomainTooLong(id)
            | Error::DomainPointerInvalid(id)
            | Error::DomainLabelInvalid(id)
            | Error::MultipleQuestions(id) => Some(id),
        }
    }
}

/// A buffer which is consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        let v = *self.octets.get(self.position)?;
        self.position += 1;
        Some(v)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let a = *self.octets.get(self.position)?;
        let b = *self.octets.get(self.position + 1)?;
        self.position += 2;
        Some(u16::from_be_bytes([a, b]))
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let a = *self.octets.get(self.position)?;
        let b = *self.octets.get(self.position + 1)?;
        let c = *self.octets.get(self.position + 2)?;
        let d = *self.octets.get(self.position + 3)?;
        self.position += 4;
        Some(u32::from_be_bytes([a, b, c, d]))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        let slice = self.octets.get(self.position..self.position + size)?;
        self.position += size;
        Some(slice)
    }

    /// A fresh cursor over the same underlying octets, positioned
    /// elsewhere: used to follow compression pointers without losing
    /// the caller's place.
    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed, or if it contains more than one
    /// question.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed, or if it contains more than one
    /// question.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let (header, qdcount, ancount, nscount, arcount) = deserialise_header(buffer)?;

        if qdcount > 1 {
            return Err(Error::MultipleQuestions(header.id));
        }

        let mut question = None;
        for _ in 0..qdcount {
            question = Some(Question::deserialise(header.id, buffer)?);
        }

        let mut answers = Vec::with_capacity(ancount.into());
        for _ in 0..ancount {
            answers.push(ResourceRecord::deserialise(header.id, buffer)?);
        }
        let mut authority = Vec::with_capacity(nscount.into());
        for _ in 0..nscount {
            authority.push(ResourceRecord::deserialise(header.id, buffer)?);
        }
        let mut additional = Vec::with_capacity(arcount.into());
        for _ in 0..arcount {
            additional.push(ResourceRecord::deserialise(header.id, buffer)?);
        }

        Ok(Self {
            header,
            question,
            answers,
            authority,
            additional,
        })
    }
}

fn deserialise_header(buffer: &mut ConsumableBuffer) -> Result<(Header, u16, u16, u16, u16), Error> {
    let id = buffer.next_u16().ok_or(Error::CompletelyBusted)?;
    let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
    let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
    let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
    let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
    let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
    let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

    let header = Header {
        id,
        is_response: flags1 & HEADER_MASK_QR != 0,
        opcode: Opcode::from_wire((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
        is_authoritative: flags1 & HEADER_MASK_AA != 0,
        is_truncated: flags1 & HEADER_MASK_TC != 0,
        recursion_desired: flags1 & HEADER_MASK_RD != 0,
        recursion_available: flags2 & HEADER_MASK_RA != 0,
        rcode: Rcode::from_wire(flags2 & HEADER_MASK_RCODE),
    };

    Ok((header, qdcount, ancount, nscount, arcount))
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = deserialise_domain(id, buffer)?;
        let qtype = RecordType::from_wire(buffer.next_u16().ok_or(Error::QuestionTooShort(id))?);
        let qclass = RecordClass::from_wire(buffer.next_u16().ok_or(Error::QuestionTooShort(id))?);

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = deserialise_domain(id, buffer)?;
        let rtype = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        let rclass = RecordClass::from_wire(buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?);
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdata_start = buffer.position();
        let rdata = deserialise_rdata(id, rtype, rdlength, buffer)?;

        // Tolerate rdata parsers which didn't consume exactly rdlength
        // octets (e.g. the `Other` passthrough always consumes exactly
        // rdlength already, but this keeps the invariant explicit).
        let consumed = buffer.position() - rdata_start;
        if consumed != usize::from(rdlength) {
            return Err(Error::ResourceRecordInvalid(id));
        }

        Ok(Self {
            name,
            rdata,
            rclass,
            ttl,
        })
    }
}

fn deserialise_rdata(
    id: u16,
    rtype: u16,
    rdlength: u16,
    buffer: &mut ConsumableBuffer,
) -> Result<RecordData, Error> {
    match RecordType::from_wire(rtype) {
        RecordType::A => {
            let octets = buffer.take(4).ok_or(Error::ResourceRecordTooShort(id))?;
            Ok(RecordData::A {
                address: Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]),
            })
        }
        RecordType::NS => Ok(RecordData::NS {
            nsdname: deserialise_domain(id, buffer)?,
        }),
        RecordType::CNAME => Ok(RecordData::CNAME {
            cname: deserialise_domain(id, buffer)?,
        }),
        RecordType::SOA => {
            let mname = deserialise_domain(id, buffer)?;
            let rname = deserialise_domain(id, buffer)?;
            let serial = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
            let refresh = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
            let retry = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
            let expire = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
            let minimum = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
            Ok(RecordData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            })
        }
        RecordType::Other(rtype) => {
            let octets = buffer
                .take(rdlength.into())
                .ok_or(Error::ResourceRecordTooShort(id))?
                .to_vec();
            Ok(RecordData::Other { rtype, octets })
        }
    }
}

/// Parse a domain name, following at most one level of compression
/// pointer indirection per label run (the pointed-to data may itself
/// start another label run, which may itself point elsewhere — this
/// does not attempt to detect pointer loops beyond a generous step
/// count, which is good enough for a server that only ever parses
/// datagrams it or well-behaved peers produced).
fn deserialise_domain(id: u16, buffer: &mut ConsumableBuffer) -> Result<DomainName, Error> {
    let mut labels: Vec<String> = Vec::new();
    let mut jumped = false;
    let mut local_buffer = buffer.at_offset(buffer.position());
    let mut steps = 0;

    loop {
        steps += 1;
        if steps > 128 {
            return Err(Error::DomainPointerInvalid(id));
        }

        let length = local_buffer.next_u8().ok_or(Error::DomainTooShort(id))?;

        if length == 0 {
            break;
        } else if length & 0b1100_0000 == 0b1100_0000 {
            let lower = local_buffer.next_u8().ok_or(Error::DomainTooShort(id))?;
            let pointer = (usize::from(length & 0b0011_1111) << 8) | usize::from(lower);
            if pointer >= local_buffer.position() - 2 {
                return Err(Error::DomainPointerInvalid(id));
            }
            if !jumped {
                buffer.skip_to(local_buffer.position());
                jumped = true;
            }
            local_buffer = local_buffer.at_offset(pointer);
        } else if length & 0b1100_0000 != 0 {
            return Err(Error::DomainLabelInvalid(id));
        } else {
            let label = local_buffer
                .take(length.into())
                .ok_or(Error::DomainTooShort(id))?;
            labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
            if labels.iter().map(|l| l.len() + 1).sum::<usize>() > 255 {
                return Err(Error::DomainTooLong(id));
            }
        }
    }

    if !jumped {
        buffer.skip_to(local_buffer.position());
    }

    if labels.is_empty() {
        Ok(DomainName::root())
    } else {
        Ok(DomainName::new(&labels.join(".")))
    }
}

impl<'a> ConsumableBuffer<'a> {
    fn skip_to(&mut self, position: usize) {
        self.position = position;
    }
}
