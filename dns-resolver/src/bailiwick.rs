//! The bailiwick filter: the trust boundary between what an upstream
//! server was asked about and what it's allowed to tell us about.

use dns_types::protocol::types::{DomainName, Message, ResourceRecord};

/// Drop every RR in `message`'s answer, authority, and additional
/// sections whose owner does not fall within `delegation`. The header
/// and question are left untouched.
pub fn filter(delegation: &DomainName, message: &Message) -> Message {
    let in_bailiwick = |rr: &ResourceRecord| rr.name.is_subdomain_of(delegation);

    Message {
        header: message.header,
        question: message.question.clone(),
        answers: message.answers.iter().filter(|rr| in_bailiwick(rr)).cloned().collect(),
        authority: message.authority.iter().filter(|rr| in_bailiwick(rr)).cloned().collect(),
        additional: message.additional.iter().filter(|rr| in_bailiwick(rr)).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::*;
    use dns_types::protocol::types::{Question, RecordClass, RecordType};
    use std::net::Ipv4Addr;

    fn message_with(rrs: Vec<ResourceRecord>) -> Message {
        let mut message = Message::from_question(
            1,
            Question {
                name: domain("www.example.com"),
                qtype: RecordType::A,
                qclass: RecordClass::IN,
            },
        );
        message.answers = rrs;
        message
    }

    #[test]
    fn drops_out_of_bailiwick_records() {
        let delegation = domain("example.com");
        let message = message_with(vec![
            a_record("www.example.com", Ipv4Addr::new(1, 1, 1, 1)),
            a_record("evil.attacker.test", Ipv4Addr::new(6, 6, 6, 6)),
        ]);
        let filtered = filter(&delegation, &message);
        assert_eq!(filtered.answers.len(), 1);
        assert_eq!(filtered.answers[0].name, domain("www.example.com"));
    }

    #[test]
    fn root_delegation_admits_everything() {
        let root = DomainName::root();
        let message = message_with(vec![a_record("anything.at.all", Ipv4Addr::new(1, 1, 1, 1))]);
        let filtered = filter(&root, &message);
        assert_eq!(filtered.answers.len(), 1);
    }

    #[test]
    fn exact_match_on_delegation_is_in_bailiwick() {
        let delegation = domain("example.com");
        let message = message_with(vec![a_record("example.com", Ipv4Addr::new(1, 1, 1, 1))]);
        let filtered = filter(&delegation, &message);
        assert_eq!(filtered.answers.len(), 1);
    }
}
