//! Serialisation of DNS messages onto the wire. Labels are always
//! written out in full; this crate never emits compression pointers
//! (RFC 1035 section 4.1.4 makes them optional for the sender).

use crate::protocol::types::*;

const HEADER_MASK_QR: u8 = 0b1000_0000;
const HEADER_OFFSET_OPCODE: u8 = 3;
const HEADER_MASK_AA: u8 = 0b0000_0100;
const HEADER_MASK_TC: u8 = 0b0000_0010;
const HEADER_MASK_RD: u8 = 0b0000_0001;
const HEADER_MASK_RA: u8 = 0b1000_0000;

/// A growable byte buffer that tracks where to backfill record counts,
/// which aren't known until the whole message has been walked.
pub struct WritableBuffer {
    octets: Vec<u8>,
}

impl WritableBuffer {
    pub fn new() -> Self {
        Self { octets: Vec::new() }
    }

    pub fn into_octets(self) -> Vec<u8> {
        self.octets
    }

    pub fn write_u8(&mut self, v: u8) {
        self.octets.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.octets.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.octets.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.octets.extend_from_slice(bytes);
    }

    fn len(&self) -> usize {
        self.octets.len()
    }

    /// Overwrite a previously-reserved `u16` slot (used for rdlength,
    /// which isn't known until the rdata has been written).
    fn patch_u16(&mut self, position: usize, v: u16) {
        self.octets[position..position + 2].copy_from_slice(&v.to_be_bytes());
    }
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    pub fn to_octets(&self) -> Vec<u8> {
        let mut buffer = WritableBuffer::new();
        self.serialise(&mut buffer);
        buffer.into_octets()
    }

    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        let qdcount = u16::from(self.question.is_some());
        buffer.write_u16(self.header.id);

        let mut flags1 = 0u8;
        if self.header.is_response {
            flags1 |= HEADER_MASK_QR;
        }
        flags1 |= self.header.opcode.to_wire() << HEADER_OFFSET_OPCODE;
        if self.header.is_authoritative {
            flags1 |= HEADER_MASK_AA;
        }
        if self.header.is_truncated {
            flags1 |= HEADER_MASK_TC;
        }
        if self.header.recursion_desired {
            flags1 |= HEADER_MASK_RD;
        }
        buffer.write_u8(flags1);

        let mut flags2 = 0u8;
        if self.header.recursion_available {
            flags2 |= HEADER_MASK_RA;
        }
        flags2 |= self.header.rcode.to_wire();
        buffer.write_u8(flags2);

        buffer.write_u16(qdcount);
        buffer.write_u16(self.answers.len() as u16);
        buffer.write_u16(self.authority.len() as u16);
        buffer.write_u16(self.additional.len() as u16);

        if let Some(question) = &self.question {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer);
        }
        for rr in &self.authority {
            rr.serialise(buffer);
        }
        for rr in &self.additional {
            rr.serialise(buffer);
        }
    }
}

impl Question {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        serialise_domain(&self.name, buffer);
        buffer.write_u16(self.qtype.to_wire());
        buffer.write_u16(self.qclass.to_wire());
    }
}

impl ResourceRecord {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        serialise_domain(&self.name, buffer);
        buffer.write_u16(self.rtype().to_wire());
        buffer.write_u16(self.rclass.to_wire());
        buffer.write_u32(self.ttl);

        let rdlength_position = buffer.len();
        buffer.write_u16(0);
        let rdata_start = buffer.len();
        serialise_rdata(&self.rdata, buffer);
        let rdlength = (buffer.len() - rdata_start) as u16;
        buffer.patch_u16(rdlength_position, rdlength);
    }
}

fn serialise_rdata(rdata: &RecordData, buffer: &mut WritableBuffer) {
    match rdata {
        RecordData::A { address } => buffer.write_bytes(&address.octets()),
        RecordData::NS { nsdname } => serialise_domain(nsdname, buffer),
        RecordData::CNAME { cname } => serialise_domain(cname, buffer),
        RecordData::SOA {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => {
            serialise_domain(mname, buffer);
            serialise_domain(rname, buffer);
            buffer.write_u32(*serial);
            buffer.write_u32(*refresh);
            buffer.write_u32(*retry);
            buffer.write_u32(*expire);
            buffer.write_u32(*minimum);
        }
        RecordData::Other { octets, .. } => buffer.write_bytes(octets),
    }
}

fn serialise_domain(name: &DomainName, buffer: &mut WritableBuffer) {
    for label in domain_wire_labels(name) {
        buffer.write_u8(label.len() as u8);
        buffer.write_bytes(label.as_bytes());
    }
    buffer.write_u8(0);
}

/// `labels()` returns outermost-first (`com`, `example`, `www`), which
/// is exactly the order `example.com` is split in text but the reverse
/// of wire order (`www`, `example`, `com`).
fn domain_wire_labels(name: &DomainName) -> Vec<&str> {
    let mut labels = name.labels();
    labels.reverse();
    labels
}
