//! The UDP transport (C5): a dual-stack socket and a one-task-per-
//! datagram receive loop, handing each decoded query to a
//! [`Responder`].

use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use dns_types::protocol::types::{Message, Rcode};

use crate::lookup::Lookup;
use crate::responder::Responder;

/// RFC 1035 doesn't require UDP responses to exceed this, and this
/// core never re-encodes a response to shrink it once built, so the
/// stack buffer used for both receiving and truncating replies is
/// sized to it exactly.
const MAX_DATAGRAM: usize = 512;

/// Byte offset of the header's second 16-bit word, whose low bit
/// (`0x02` in the big-endian first octet) is TC.
const TC_BYTE: usize = 2;
const TC_BIT: u8 = 0b0000_0010;

pub struct UdpServer<L: Lookup + Send + Sync + 'static> {
    socket: Arc<UdpSocket>,
    responder: Arc<Responder<L>>,
}

impl<L: Lookup + Send + Sync + 'static> UdpServer<L> {
    /// Bind a dual-stack IPv6 socket on `port` (0 selects an
    /// OS-assigned port), with `IPV6_V6ONLY` disabled so IPv4-mapped
    /// addresses are accepted on the same socket.
    pub fn new(port: u16, responder: Responder<L>) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(false)?;
        let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self {
            socket: Arc::new(socket),
            responder: Arc::new(responder),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the receive loop: one task is spawned per datagram, so a
    /// slow lookup for one query never blocks another's reply.
    pub async fn run(&self) -> io::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            tracing::debug!(%peer, "accepted datagram");
            let payload = buf[..len].to_vec();
            let socket = Arc::clone(&self.socket);
            let responder = Arc::clone(&self.responder);
            tokio::spawn(async move {
                handle_datagram(&socket, &responder, peer, &payload).await;
            });
        }
    }
}

async fn handle_datagram<L: Lookup>(
    socket: &UdpSocket,
    responder: &Responder<L>,
    peer: SocketAddr,
    payload: &[u8],
) {
    // Decode the header, then the question(s), per the transport's
    // two-stage receive path: a query's answer/authority/additional
    // sections are never read by the responder (it clears them
    // unconditionally before filling in its own), so a malformed
    // trailing RR there shouldn't FORMERR a query whose header and
    // questions are otherwise fine.
    let response = match Message::from_header_and_questions(payload) {
        Ok(query) => responder.respond(&query).await,
        Err(_) => {
            tracing::info!(%peer, "decode failure, replying FORMERR");
            Message::minimal_response(leading_id(payload), Rcode::FormatError)
        }
    };
    send(socket, peer, &response).await;
}

/// Best-effort recovery of the id field from a datagram that failed
/// to decode past the header: the id is always the first two octets,
/// readable independent of everything else in the message.
fn leading_id(payload: &[u8]) -> u16 {
    match payload {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

async fn send(socket: &UdpSocket, peer: SocketAddr, message: &Message) {
    let mut encoded = message.to_octets();
    if encoded.len() > MAX_DATAGRAM {
        encoded[TC_BYTE] |= TC_BIT;
        encoded.truncate(MAX_DATAGRAM);
    }
    if let Err(error) = socket.send_to(&encoded, peer).await {
        tracing::debug!(%peer, ?error, "send error");
    }
}
