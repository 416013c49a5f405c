//! End-to-end tests of the iterative resolver against fake upstream
//! servers standing in for a root and a delegated zone, covering the
//! glue-delegation and bailiwick-poisoning scenarios from the
//! concrete test scenarios this project is built against.

use std::net::Ipv4Addr;
use std::time::Instant;

use dns_resolver::cache::SharedCache;
use dns_resolver::recursive;
use dns_types::protocol::types::test_util::{a_record, domain, ns_record};
use dns_types::protocol::types::{Message, Question, RecordClass, RecordType};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

fn query(name: &str) -> Message {
    Message::from_question(
        1,
        Question {
            name: domain(name),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        },
    )
}

/// Both fixtures below bind the fixed upstream port on distinct
/// loopback addresses, since the resolver always dials
/// `dns_resolver::UPSTREAM_PORT` regardless of what the glue record's
/// own port would be in a real deployment.
#[tokio::test]
async fn follows_glue_delegation_to_the_address_it_names() {
    let (leaf_reached_tx, leaf_reached_rx) = oneshot::channel();

    // The leaf stands in for ns1.example.net.: once reached, it has
    // nothing further to delegate, so the resolver accepts its
    // (empty) reply as final.
    let leaf = UdpSocket::bind((Ipv4Addr::new(127, 0, 0, 2), dns_resolver::UPSTREAM_PORT))
        .await
        .expect("bind leaf fixture");
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        let (size, peer) = leaf.recv_from(&mut buf).await.unwrap();
        let request = Message::from_octets(&buf[..size]).unwrap();
        let _ = leaf_reached_tx.send(());
        let reply = request.make_response();
        let _ = leaf.send_to(&reply.to_octets(), peer).await;
    });

    let root = UdpSocket::bind((Ipv4Addr::new(127, 0, 0, 1), dns_resolver::UPSTREAM_PORT))
        .await
        .expect("bind root fixture");
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let Ok((size, peer)) = root.recv_from(&mut buf).await else {
                return;
            };
            let Ok(request) = Message::from_octets(&buf[..size]) else {
                continue;
            };
            let mut reply = request.make_response();
            reply.authority.push(ns_record("example.net", "ns1.example.net"));
            reply
                .additional
                .push(a_record("ns1.example.net", Ipv4Addr::new(127, 0, 0, 2)));
            let _ = root.send_to(&reply.to_octets(), peer).await;
        }
    });

    let cache = SharedCache::new();
    let result = recursive::resolve(Ipv4Addr::new(127, 0, 0, 1), &cache, &query("host.sub.example.net")).await;

    assert!(result.is_ok(), "expected the resolver to follow the delegation, got {result:?}");
    leaf_reached_rx.await.expect("leaf fixture was never queried");
}

#[tokio::test]
async fn bailiwick_filter_drops_poisoned_additional_records() {
    let mut root_reply = query("host.sub.example.net");
    root_reply.header.is_response = true;
    root_reply.authority.push(ns_record("example.net", "ns1.example.net"));
    root_reply
        .additional
        .push(a_record("ns1.example.net", Ipv4Addr::new(192, 0, 2, 53)));
    // A poisoned record claiming authority over an unrelated domain.
    root_reply.additional.push(a_record("evil.com", Ipv4Addr::new(6, 6, 6, 6)));

    let filtered = dns_resolver::bailiwick::filter(&domain("example.net"), &root_reply);
    assert_eq!(filtered.additional.len(), 1);
    assert_eq!(filtered.additional[0].name, domain("ns1.example.net"));

    let cache = SharedCache::new();
    cache.store(&domain("evil.com"), RecordType::A, filtered, Instant::now());
    // Nothing was ever admitted under (evil.com, A): the poisoned
    // record was stripped before the message was stored.
    assert!(cache
        .lookup(&domain("evil.com"), RecordType::A, Instant::now())
        .is_none());
}

/// When a delegation names an NS host with no glue in the additional
/// section, the resolver has to look that host's own address up as a
/// nested query. That nested query must carry RD=1: the upstream it
/// lands on on (another authority-only server in the hierarchy) treats
/// RD=0 as "don't recurse on my behalf", which would make it refuse to
/// walk this server down to the NS hostname's own delegation.
#[tokio::test]
async fn no_glue_delegation_resolves_the_ns_hostname_with_recursion_desired() {
    let (rd_tx, rd_rx) = oneshot::channel();
    let mut rd_tx = Some(rd_tx);

    let root = UdpSocket::bind((Ipv4Addr::new(127, 0, 0, 4), dns_resolver::UPSTREAM_PORT))
        .await
        .expect("bind root fixture");
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let Ok((size, peer)) = root.recv_from(&mut buf).await else {
                return;
            };
            let Ok(request) = Message::from_octets(&buf[..size]) else {
                continue;
            };
            let mut reply = request.make_response();
            if request.question.as_ref().map(|q| &q.name) == Some(&domain("ns1.example.net")) {
                if let Some(tx) = rd_tx.take() {
                    let _ = tx.send(request.header.recursion_desired);
                }
                // No further delegation; the nested lookup ends here
                // with nothing found, which is fine for this test.
            } else {
                reply.authority.push(ns_record("example.net", "ns1.example.net"));
                // Deliberately no glue in `additional`.
            }
            let _ = root.send_to(&reply.to_octets(), peer).await;
        }
    });

    let cache = SharedCache::new();
    let result = recursive::resolve(Ipv4Addr::new(127, 0, 0, 4), &cache, &query("host.sub.example.net")).await;

    assert!(result.is_ok());
    let rd_on_nested_query = rd_rx.await.expect("nested ns1.example.net query was never sent");
    assert!(rd_on_nested_query, "nested NS-hostname lookup must set RD=1");
}

#[tokio::test]
async fn resolve_returns_an_error_when_the_root_is_unreachable() {
    let cache = SharedCache::new();
    // Nothing binds the upstream port at this address, so every
    // attempt must time out.
    let result = recursive::resolve(Ipv4Addr::new(127, 0, 0, 3), &cache, &query("example.com")).await;
    assert!(result.is_err());
}
