//! The authoritative responder: answers queries whose name falls
//! within the configured zone.

use dns_types::protocol::types::{Message, RecordData, RecordType, Rcode};

use crate::zone::Zone;

/// Build a response for a request already known to be authoritative
/// for `zone` (i.e. `zone.is_authoritative(qname)` holds).
pub fn resolve(zone: &Zone, request: &Message) -> Message {
    let mut response = request.make_response();
    response.header.is_authoritative = true;

    let Some(question) = &request.question else {
        response.header.rcode = Rcode::FormatError;
        return response;
    };

    let qname = question.name.clone();
    let qtype = question.qtype;

    let mut found = false;

    let exact = zone.lookup_type(&qname, qtype);
    if !exact.is_empty() {
        response.answers.extend(exact);
        found = true;
    } else {
        let cname = zone.lookup_type(&qname, RecordType::CNAME);
        if let Some(cname_rr) = cname.into_iter().next() {
            let target = match &cname_rr.rdata {
                RecordData::CNAME { cname } => cname.clone(),
                _ => unreachable!("lookup_type(CNAME) only returns CNAME rdata"),
            };
            response.answers.push(cname_rr);
            if zone.is_authoritative(&target) {
                response.answers.extend(zone.lookup_type(&target, qtype));
            }
            found = true;
        }
    }

    if qtype == RecordType::NS {
        let ns_records = zone.lookup_type(&qname, RecordType::NS);
        if !ns_records.is_empty() {
            found = true;
        }
        for ns in &ns_records {
            if let RecordData::NS { nsdname } = &ns.rdata {
                response
                    .additional
                    .extend(zone.lookup_type(nsdname, RecordType::A));
            }
        }
    }

    if found {
        if qtype != RecordType::NS {
            response.authority.extend(zone.apex_ns().iter().cloned());
        }
    } else {
        response.header.rcode = Rcode::NameError;
        response.authority.extend(zone.apex_ns().iter().cloned());
    }

    response
}
