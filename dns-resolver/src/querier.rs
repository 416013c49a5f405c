//! The upstream querier: sends a prepared query to a single upstream
//! server over UDP with bounded retries.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use dns_types::protocol::types::Message;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Per-attempt timeout for an upstream query.
const QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of retries after the first attempt (six attempts total).
const RETRIES: u32 = 5;

/// Send `request` to `(ip, port)`, waiting up to `QUERY_TIMEOUT` for a
/// reply and retrying on timeout up to `RETRIES` times. Returns the
/// first successfully parsed reply, or `None` if every attempt timed
/// out. A socket error or an unparseable reply ends the query
/// immediately without consuming the remaining retry budget.
///
/// Each attempt uses a fresh ephemeral socket: since only one query is
/// ever outstanding per socket, there is no need to match transaction
/// ids against a previous attempt's.
pub async fn query(ip: Ipv4Addr, port: u16, request: &Message) -> Option<Message> {
    let destination = SocketAddr::from((ip, port));
    let wire = request.to_octets();

    for attempt in 0..=RETRIES {
        match query_once(destination, &wire).await {
            Ok(Attempt::Success(reply)) => return Some(reply),
            Ok(Attempt::Failed) => {
                warn!(%destination, attempt, "upstream query failed, giving up");
                return None;
            }
            Err(_elapsed) => {
                debug!(%destination, attempt, "upstream query timed out, retrying");
            }
        }
    }

    warn!(%destination, "upstream query exhausted all retries");
    None
}

/// The outcome of one attempt that didn't time out.
enum Attempt {
    Success(Message),
    /// A socket error or an unparseable reply: a final failure of this
    /// step, not something retrying would fix.
    Failed,
}

async fn query_once(destination: SocketAddr, wire: &[u8]) -> Result<Attempt, tokio::time::error::Elapsed> {
    timeout(QUERY_TIMEOUT, async {
        let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
            return Attempt::Failed;
        };
        if socket.connect(destination).await.is_err() {
            return Attempt::Failed;
        }
        if socket.send(wire).await.is_err() {
            return Attempt::Failed;
        }

        let mut buf = [0u8; 65535];
        let Ok(size) = socket.recv(&mut buf).await else {
            return Attempt::Failed;
        };
        match Message::from_octets(&buf[..size]) {
            Ok(message) => Attempt::Success(message),
            Err(_) => Attempt::Failed,
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::{test_util::domain, Question, RecordClass, RecordType};
    use tokio::net::UdpSocket as TokioUdpSocket;

    fn request() -> Message {
        Message::from_question(
            7,
            Question {
                name: domain("example.com"),
                qtype: RecordType::A,
                qclass: RecordClass::IN,
            },
        )
    }

    #[tokio::test]
    async fn returns_the_parsed_reply_on_success() {
        let server = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (size, from) = server.recv_from(&mut buf).await.unwrap();
            let req = Message::from_octets(&buf[..size]).unwrap();
            let reply = req.make_response();
            server.send_to(&reply.to_octets(), from).await.unwrap();
        });

        let reply = query(
            if let SocketAddr::V4(v4) = server_addr {
                *v4.ip()
            } else {
                panic!("expected an IPv4 address")
            },
            server_addr.port(),
            &request(),
        )
        .await;

        responder.await.unwrap();
        assert!(reply.is_some());
        assert_eq!(reply.unwrap().header.id, 7);
    }

    #[tokio::test]
    async fn gives_up_after_retries_exhausted() {
        // Nothing is listening on this port, so every attempt must time
        // out; this exercises the full retry budget.
        let reply = query(Ipv4Addr::new(127, 0, 0, 1), 1, &request()).await;
        assert!(reply.is_none());
    }
}
