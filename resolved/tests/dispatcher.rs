//! End-to-end tests of the dispatcher against a real UDP socket and a
//! fixture zone file, covering the authoritative-hit, NXDOMAIN, and
//! CNAME-chase concrete scenarios.

use std::net::Ipv4Addr;
use std::sync::Arc;

use dns_resolver::cache::SharedCache;
use dns_resolver::metrics::Metrics;
use dns_resolver::zone::Zone;
use dns_types::protocol::types::{Message, Question, RecordClass, RecordType, Rcode};
use resolved::dispatcher;
use tokio::net::UdpSocket;

const FIXTURE: &str = include_str!("fixtures/example.com.zone");

async fn start_server() -> std::net::SocketAddr {
    let zone = Arc::new(Zone::from_str(FIXTURE).unwrap());
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();

    tokio::spawn(dispatcher::run(
        Arc::clone(&socket),
        zone,
        SharedCache::new(),
        Ipv4Addr::new(127, 0, 0, 1),
        Metrics::new(),
    ));

    addr
}

async fn ask(server: std::net::SocketAddr, name: &str, qtype: RecordType) -> Message {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let request = Message::from_question(
        99,
        Question {
            name: dns_types::protocol::types::DomainName::new(name),
            qtype,
            qclass: RecordClass::IN,
        },
    );
    client.send_to(&request.to_octets(), server).await.unwrap();

    let mut buf = [0u8; 512];
    let size = client.recv(&mut buf).await.unwrap();
    Message::from_octets(&buf[..size]).unwrap()
}

#[tokio::test]
async fn authoritative_hit_returns_the_matching_record() {
    let server = start_server().await;
    let reply = ask(server, "www.example.com", RecordType::A).await;

    assert_eq!(reply.header.rcode, Rcode::NoError);
    assert!(reply.header.is_authoritative);
    assert!(reply.header.recursion_available);
    assert_eq!(reply.answers.len(), 1);
    assert_eq!(reply.authority.len(), 1);
}

#[tokio::test]
async fn authoritative_miss_returns_nxdomain_with_authority() {
    let server = start_server().await;
    let reply = ask(server, "nope.example.com", RecordType::A).await;

    assert_eq!(reply.header.rcode, Rcode::NameError);
    assert!(reply.answers.is_empty());
    assert_eq!(reply.authority.len(), 1);
}

#[tokio::test]
async fn cname_chase_within_the_zone_is_returned_in_order() {
    let server = start_server().await;
    let reply = ask(server, "a.example.com", RecordType::A).await;

    assert_eq!(reply.header.rcode, Rcode::NoError);
    assert_eq!(reply.answers.len(), 2);
    assert_eq!(reply.answers[0].rtype(), RecordType::CNAME);
    assert_eq!(reply.answers[1].rtype(), RecordType::A);
}

#[tokio::test]
async fn transaction_id_is_preserved_from_the_request() {
    let server = start_server().await;
    let reply = ask(server, "www.example.com", RecordType::A).await;
    assert_eq!(reply.header.id, 99);
}
