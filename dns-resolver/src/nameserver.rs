//! A single upstream server, and the mechanics of sending it one
//! query and waiting for one reply.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use dns_types::protocol::types::{Message, Question};

use crate::lookup::ResolutionError;

/// How a server is reached. UDP is the only method this core
/// implements; the variant exists so the type shape matches the
/// covered behavior and leaves room for a TCP fallback without a
/// breaking change.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnMethod {
    Udp,
}

/// A configured upstream server.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DnsServer {
    pub ip: IpAddr,
    pub port: u16,
    pub conn_method: ConnMethod,
    /// Whether to set RD when forwarding a query to this server.
    pub recursive: bool,
}

impl DnsServer {
    pub fn new_v4(ip: Ipv4Addr, recursive: bool) -> Self {
        Self {
            ip: IpAddr::V4(ip),
            port: 53,
            conn_method: ConnMethod::Udp,
            recursive,
        }
    }

    pub fn new_v6(ip: Ipv6Addr, recursive: bool) -> Self {
        Self {
            ip: IpAddr::V6(ip),
            port: 53,
            conn_method: ConnMethod::Udp,
            recursive,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Send one query to one server and wait for one reply, both bounded
/// by `timeout`. The query always has `header.id = 1`: there is
/// never more than one in-flight query per attempt, so nothing needs
/// to disambiguate replies by id.
///
/// Returns the decoded reply alongside the raw octets it was decoded
/// from, since CNAME-chase rdata re-parsing needs a fresh cursor over
/// those original bytes for compression pointers to resolve (see
/// `dns_types::protocol::types::Rr::name_from_rdata`).
pub async fn query_nameserver(
    server: &DnsServer,
    question: Question,
    timeout: Duration,
) -> Result<(Message, Vec<u8>), ResolutionError> {
    let query = Message::from_question(1, server.recursive, question);
    let request = query.to_octets();

    let local_addr: SocketAddr = match server.ip {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = tokio::time::timeout(timeout, UdpSocket::bind(local_addr))
        .await
        .map_err(|_| ResolutionError::Timeout)
        .and_then(|result| result.map_err(|_| ResolutionError::Timeout))?;

    tokio::time::timeout(timeout, socket.connect(server.socket_addr()))
        .await
        .map_err(|_| ResolutionError::Timeout)
        .and_then(|result| result.map_err(|_| ResolutionError::Timeout))?;

    tokio::time::timeout(timeout, socket.send(&request))
        .await
        .map_err(|_| ResolutionError::Timeout)
        .and_then(|result| result.map_err(|_| ResolutionError::Timeout))?;

    let mut buf = [0u8; 512];
    let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| ResolutionError::Timeout)
        .and_then(|result| result.map_err(|_| ResolutionError::Timeout))?;

    let raw = buf[..len].to_vec();
    let message =
        Message::from_octets(&raw).map_err(|_| ResolutionError::InvalidResponse)?;

    if !message.header.is_response {
        return Err(ResolutionError::InvalidResponse);
    }

    Ok((message, raw))
}
