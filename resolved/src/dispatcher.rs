//! The dispatcher: owns the bound UDP socket, and spawns one worker
//! task per incoming datagram.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dns_resolver::cache::SharedCache;
use dns_resolver::metrics::Metrics;
use dns_resolver::zone::Zone;
use dns_resolver::{authoritative, recursive};
use dns_types::protocol::types::{Message, Rcode};
use tokio::net::UdpSocket;
use tracing::{info, info_span, warn, Instrument};

/// Datagrams larger than this are simply not valid DNS-over-UDP
/// requests for this server (the wire format caps a message at 65535
/// octets in any case).
const MAX_DATAGRAM_SIZE: usize = 65535;

pub async fn run(socket: Arc<UdpSocket>, zone: Arc<Zone>, cache: SharedCache, root_ip: Ipv4Addr, metrics: Metrics) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (size, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(error) => {
                warn!(?error, "UDP recv error");
                continue;
            }
        };

        let datagram = buf[..size].to_vec();
        let socket = Arc::clone(&socket);
        let zone = Arc::clone(&zone);
        let cache = cache.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            if let Some(reply) = handle_datagram(&zone, &cache, root_ip, &metrics, peer, &datagram).await {
                let wire = reply.to_octets();
                if let Err(error) = socket.send_to(&wire, peer).await {
                    warn!(?peer, ?error, "UDP send error");
                }
            }
        });
    }
}

async fn handle_datagram(
    zone: &Zone,
    cache: &SharedCache,
    root_ip: Ipv4Addr,
    metrics: &Metrics,
    peer: SocketAddr,
    datagram: &[u8],
) -> Option<Message> {
    let request = match Message::from_octets(datagram) {
        Ok(request) => request,
        Err(error) => {
            info!(?peer, ?error, "malformed request");
            return error
                .id()
                .map(|id| Message::make_bare_response(id, Rcode::ServerFailure));
        }
    };

    let Some(question) = request.question.clone() else {
        info!(?peer, "request carried no question");
        let mut response = request.make_response();
        response.header.rcode = Rcode::ServerFailure;
        return Some(response);
    };

    if !request.header.recursion_desired && !zone.is_authoritative(&question.name) {
        info!(?peer, qname = %question.name, "refusing recursion for non-authoritative name");
        metrics.record_servfail_response();
        let mut response = request.make_response();
        response.header.rcode = Rcode::ServerFailure;
        return Some(response);
    }

    if zone.is_authoritative(&question.name) {
        let response = authoritative::resolve(zone, &request)
            .instrument(info_span!("authoritative", qname = %question.name))
            .await;
        metrics.record_authoritative_response();
        if response.header.rcode == Rcode::NameError {
            metrics.record_nxdomain_response();
        }
        return Some(response);
    }

    let now = std::time::Instant::now();
    if let Some(mut cached) = cache.lookup(&question.name, question.qtype, now) {
        metrics.record_cache_hit();
        cached.header.id = request.header.id;
        cached.header.is_response = true;
        cached.header.is_authoritative = false;
        cached.header.recursion_available = true;
        cached.header.recursion_desired = request.header.recursion_desired;
        return Some(cached);
    }
    metrics.record_cache_miss();

    metrics.record_recursive_resolution();
    match recursive::resolve(root_ip, cache, &request)
        .instrument(info_span!("recursive", qname = %question.name))
        .await
    {
        Ok(mut reply) => {
            reply.header.id = request.header.id;
            reply.header.is_response = true;
            reply.header.is_authoritative = false;
            reply.header.recursion_available = true;
            reply.header.recursion_desired = request.header.recursion_desired;
            Some(reply)
        }
        Err(error) => {
            warn!(?peer, qname = %question.name, %error, "resolution failed");
            metrics.record_servfail_response();
            let mut response = request.make_response();
            response.header.rcode = Rcode::ServerFailure;
            Some(response)
        }
    }
}
